use std::collections::BTreeSet;
use std::fs;

use tempfile::TempDir;
use tracelog_sessions::{EventKind, LoadOptions, SessionIndex, SessionStore, SpanMarker};

const TRACE: &str = "\
vm.go:88: 1(0:1) # 0 === Begin @0x0000
vm.go:88: 1(0:1) # 1 >>> fork @0x0001 labels=loop spanOpen=true
vm.go:88: 1(0:1) # 1 +++ Copy @0x0001 child=1(1:2)
vm.go:88: 1(0:1) # 2 ... fork @0x0001
vm.go:88: 1(0:1) # 3 === End @0x0002 err=\"HALT(1)\"
vm.go:88: 1(1:2) # 4 ... add @0x0003 ps=[1 2]
vm.go:90: 1(1:2) stack is [3]
  dangling detail
vm.go:88: 1(1:2) # 5 === End @0x0004 out_x=[3]
";

fn write_trace(contents: &str) -> (TempDir, SessionStore) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trace.log");
    fs::write(&path, contents).unwrap();
    (dir, SessionStore::with_path(path))
}

#[test]
fn test_load_text_trace() {
    let (_dir, store) = write_trace(TRACE);
    let sessions = store.load(&LoadOptions::default()).unwrap().sessions;

    assert_eq!(sessions.len(), 2);
    let root = &sessions[0];
    assert_eq!(root.id, "1(0:1)");
    assert_eq!(root.error, "HALT(1)");
    let kinds: Vec<EventKind> = root.records.iter().map(|r| r.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::Begin,
            EventKind::PreOp,
            EventKind::Copy,
            EventKind::PostOp,
            EventKind::End
        ]
    );
    assert_eq!(root.records[1].extra.labels, vec!["loop"]);
    assert_eq!(root.records[1].extra.span_open, Some(SpanMarker::Here));
    assert_eq!(root.records[2].extra.child.as_deref(), Some("1(1:2)"));

    let child = &sessions[1];
    assert_eq!(child.parent_id.as_deref(), Some("1(0:1)"));
    assert_eq!(child.values, "out_x=[3]");
    assert_eq!(child.records[0].kind, EventKind::Copy);
    assert_eq!(child.records[0].extra.parent.as_deref(), Some("1(0:1)"));
    assert_eq!(child.records[1].notes, vec!["stack is [3]"]);
    assert_eq!(child.unknown, vec!["  dangling detail"]);

    let index = SessionIndex::build(sessions);
    let run = index.select_root(1).unwrap();
    assert_eq!(run.results().mark(2), Some(tracelog_sessions::Mark::Goal));
}

#[test]
fn test_load_ignores_halt_codes() {
    let (_dir, store) = write_trace(TRACE);
    let opts = LoadOptions {
        ignore_halt_codes: BTreeSet::from([1]),
    };
    let sessions = store.load(&opts).unwrap().sessions;

    let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["1(1:2)"]);
}

#[test]
fn test_load_json_array() {
    let (_dir, store) = write_trace(
        r#"  [{"id": "4(0:4)", "parent_id": null, "error": null, "values": null,
              "records": null, "extra": {"out": "[1]"}}]"#,
    );
    let sessions = store.load(&LoadOptions::default()).unwrap().sessions;

    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].values, "out=[1]");
    assert!(sessions[0].records.is_empty());
}

#[test]
fn test_load_missing_file_has_context() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::with_path(dir.path().join("absent.json"));
    let err = store.load(&LoadOptions::default()).unwrap_err();
    assert!(err.to_string().contains("Failed to open trace file"));
}

#[test]
fn test_load_json_keeps_decodable_records() {
    let (_dir, store) = write_trace(
        r#"[{"id": "4(0:4)", "parent_id": null, "values": "1"},
            {"id": 7, "parent_id": null},
            {"id": "4(4:5)", "parent_id": "4(0:4)", "extra": {"out": 5}},
            {"id": "4(4:6)", "parent_id": "4(0:4)", "error": "HALT(2)"}]"#,
    );
    let trace = store.load(&LoadOptions::default()).unwrap();

    let ids: Vec<&str> = trace.sessions.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["4(0:4)", "4(4:6)"]);

    let index = SessionIndex::build(trace);
    let unparsed: Vec<&str> = index.report().unparsed.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(unparsed, vec!["7", "4(4:5)"]);
    assert_eq!(index.report().loaded, 2);
    assert_eq!(index.select_root(4).unwrap().members(), 2);
}
