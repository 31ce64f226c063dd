mod common;

use serde_json::json;
use tracelog_sessions::{
    assemble_normalized, assemble_raw, Collapse, Explorer, Navigation, NodeLog, SessionIndex,
    SpanTree,
};

fn assert_siblings_disjoint(tree: &SpanTree, level: &[usize]) {
    let closed: Vec<_> = level
        .iter()
        .map(|&i| &tree.frames[i])
        .filter(|f| !f.is_broken())
        .collect();
    for f in &closed {
        assert!(f.start <= f.end.unwrap());
    }
    for pair in closed.windows(2) {
        assert!(pair[0].end.unwrap() < pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
    }
    for &i in level {
        assert_siblings_disjoint(tree, &tree.frames[i].children);
    }
}

#[test]
fn test_raw_segments_cover_each_session_once() {
    let index = SessionIndex::build(common::fixture());
    let log = assemble_raw(&index, None, "1(2:4)").unwrap();

    assert_eq!(log.segments.len(), 3);
    let last = log.segments.len() - 1;
    for (depth, seg) in log.segments.iter().enumerate() {
        let records = &index.session(&seg.node_id).unwrap().records;
        let shown: Vec<_> = log.segment_rows(depth).iter().map(|r| &r.event).collect();
        if depth == last {
            assert_eq!(shown, records.iter().collect::<Vec<_>>());
        } else {
            let next = &log.segments[depth + 1].node_id;
            assert_eq!(shown, records[..seg.len].iter().collect::<Vec<_>>());
            assert!(shown.last().unwrap().copies_to(next));
            assert!(!shown[..shown.len() - 1].iter().any(|e| e.copies_to(next)));
        }
    }
    assert_eq!(log.rows.len(), 3 + 3 + 3);
}

#[test]
fn test_raw_goal_path_highlight() {
    let mut ex = Explorer::load(common::fixture());
    assert!(ex.select_root(1));
    let log = ex.assemble_raw("1(1:2)").unwrap();

    let flags: Vec<bool> = log.rows.iter().map(|r| r.on_goal_path).collect();
    // Root rows up to the copy at count 1, then 1(1:2) up to its copy at 7.
    assert_eq!(flags, vec![true, true, true, true, true, true, false, false, false]);
}

#[test]
fn test_normalized_is_idempotent() {
    let index = SessionIndex::build(common::fixture());
    for id in ["1(0:1)", "1(1:2)", "1(1:3)", "1(2:4)"] {
        let a = assemble_normalized(&index, None, id).unwrap();
        let b = assemble_normalized(&index, None, id).unwrap();
        assert_eq!(a, b);
        assert_siblings_disjoint(&a.spans, &a.spans.roots);
    }
}

#[test]
fn test_normalized_chain_through_spawn_points() {
    let index = SessionIndex::build(common::fixture());
    let log = assemble_normalized(&index, None, "1(2:4)").unwrap();

    let actions: Vec<&str> = log.rows.iter().map(|r| r.event.action.as_str()).collect();
    assert_eq!(actions, vec!["Begin", "fork", "fork", "mul", "End"]);
    let indents: Vec<usize> = log.rows.iter().map(|r| r.indent).collect();
    assert_eq!(indents, vec![0, 0, 1, 1, 0]);

    // The loop opened in the root is closed by the grandchild's End.
    let frame = &log.spans.frames[0];
    assert_eq!(frame.label, "loop");
    assert_eq!((frame.start, frame.end), (1, Some(3)));
    assert!(!frame.is_broken());

    // Merged ops carry the spawning copy's extra.
    assert_eq!(log.rows[1].event.extra.child.as_deref(), Some("1(1:2)"));
    assert_eq!(log.rows[2].event.extra.child.as_deref(), Some("1(2:4)"));
    assert_eq!(log.rows[3].event.extra.parent.as_deref(), Some("1(1:2)"));
    assert_eq!(log.dropped_pre_ops, 0);
}

#[test]
fn test_dotted_close_and_collapse() {
    let index = SessionIndex::build(common::fixture());
    let log = assemble_normalized(&index, None, "1(0:1)").unwrap();

    assert_eq!(log.rows.len(), 5);
    let frame = &log.spans.frames[0];
    assert_eq!((frame.start, frame.end), (1, Some(2)));

    let mut collapse = Collapse::default();
    assert!(collapse.collapse(&log.spans, 0));
    assert_eq!(collapse.visible_rows(&log.spans, log.rows.len()), vec![0, 1, 3, 4]);
    assert!(collapse.expand(0));
    assert_eq!(collapse.visible_rows(&log.spans, log.rows.len()).len(), 5);
}

#[test]
fn test_pre_op_span_open_before_end_is_broken() {
    let sessions = common::sessions(json!([
        {"id": "3(0:3)", "parent_id": null, "records": [
            {"kind": "begin", "count": 0, "action": "Begin"},
            {"kind": "preOp", "count": 1, "action": "jmp", "extra": {"labels": ["retry"], "spanOpen": true}},
            {"kind": "end", "count": 2, "action": "End", "extra": {"err": "HALT(1)"}}
        ]}
    ]));
    let index = SessionIndex::build(sessions);
    let log = assemble_normalized(&index, None, "3(0:3)").unwrap();

    assert_eq!(log.spans.frames.len(), 1);
    assert!(log.spans.frames[0].is_broken());
    assert_eq!(log.spans.broken().count(), 1);
    assert!(!Collapse::default().collapse(&log.spans, 0));
}

#[test]
fn test_navigate_contract() {
    let mut ex = Explorer::load(common::fixture());
    assert!(ex.select_root(9));

    match ex.navigate("#1(2:4)") {
        Navigation::Log {
            address,
            path,
            log: NodeLog::Normalized(log),
        } => {
            assert_eq!(address, "#1(2:4)");
            assert_eq!(path.iter().map(|n| n.mach).collect::<Vec<_>>(), vec![1, 2, 4]);
            assert_eq!(log.rows.len(), 5);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(ex.active().unwrap().root_mach(), 1);

    for bad in ["#nope", "#1(1:99)", "#7(0:7)", ""] {
        let nav = ex.navigate(bad);
        assert!(matches!(nav, Navigation::Cleared { .. }), "{}", bad);
        assert_eq!(nav.address(), "#1(0:1)");
    }
}
