//! Text rendering for the query commands.

use colored::Colorize;

use tracelog_sessions::{
    assemble_raw, Event, LogRow, Mark, NormalizedLog, OpRow, OutcomeBucket, RawLog, ResultMap,
    RootSummary, SessionIndex, TraceError, TreeNode,
};

/// `root(m0:m1:...:mN)`: the machine ids of the whole ancestry of `id`.
pub fn full_id(index: &SessionIndex, id: &str) -> Result<String, TraceError> {
    let chain = index.chain(id)?;
    let root = chain.last().map_or(0, |e| e.mid.root);
    let machs: Vec<String> = chain.iter().map(|e| e.mid.mach.to_string()).collect();
    Ok(format!("{}({})", root, machs.join(":")))
}

/// One record as a log line.
pub fn format_event(id: &str, ev: &Event) -> String {
    let line = format!(
        "{:>10} #{:>4} @{:#06x} {:<30} {}",
        id,
        ev.count,
        ev.ip,
        ev.action,
        ev.extra.display_pairs()
    );
    line.trim_end().to_string()
}

fn push_notes(out: &mut Vec<String>, prefix: &str, ev: &Event) {
    out.extend(ev.notes.iter().map(|n| format!("{}    {}", prefix, n)));
}

fn mark_label(mark: Option<Mark>) -> String {
    match mark {
        Some(Mark::Goal) => " [goal]".bright_green().to_string(),
        Some(Mark::GoalPath) => " [goal path]".green().to_string(),
        None => String::new(),
    }
}

/// Terse summary line of one session.
pub fn dump_line(index: &SessionIndex, id: &str) -> Result<String, TraceError> {
    let session = index
        .session(id)
        .ok_or_else(|| TraceError::NodeNotFound(id.to_string()))?;
    let full = full_id(index, id)?;
    Ok(if session.error.is_empty() {
        format!("{}\tvalues={}", full, session.values)
    } else {
        format!("{}\terr={}", full, session.error)
    })
}

/// Ids of every indexed session, ordered by (root, parent, mach).
pub fn dump_order(index: &SessionIndex) -> Vec<String> {
    let mut entries: Vec<_> = index.iter().collect();
    entries.sort_by_key(|e| (e.mid.root, e.mid.parent, e.mid.mach));
    entries.into_iter().map(|e| e.id().to_string()).collect()
}

/// The terse line, then the session's log from its root, indented.
pub fn dump_full(index: &SessionIndex, id: &str) -> Result<Vec<String>, TraceError> {
    let mut out = vec![dump_line(index, id)?];
    let log = assemble_raw(index, None, id)?;
    for row in &log.rows {
        out.push(format!("\t{}", format_event(&row.node_id, &row.event)));
        push_notes(&mut out, "\t", &row.event);
    }
    if let Some(session) = index.session(id) {
        out.extend(session.extra.iter().map(|(k, v)| format!("\t{}={}", k, v)));
    }
    out.push(String::new());
    Ok(out)
}

pub fn roots_lines(roots: &[RootSummary]) -> Vec<String> {
    roots
        .iter()
        .map(|r| {
            let marker = if r.active { "*".bright_cyan().to_string() } else { " ".to_string() };
            format!("{} {:<16} {} sessions", marker, r.id, r.sessions)
        })
        .collect()
}

pub fn outcome_lines(buckets: &[OutcomeBucket]) -> Vec<String> {
    let mut out = Vec::new();
    for bucket in buckets {
        let name = if bucket.name == "values" {
            bucket.name.bright_green().to_string()
        } else if bucket.name.starts_with("err=") {
            bucket.name.bright_red().to_string()
        } else {
            bucket.name.bright_yellow().to_string()
        };
        out.push(format!("{} ({})", name, bucket.ids.len()));
        out.extend(bucket.ids.iter().map(|id| format!("  {}", id)));
    }
    out
}

pub fn result_lines(results: &ResultMap) -> Vec<String> {
    results
        .iter()
        .map(|e| {
            format!(
                "{:<16} <= #{:<6} -> {}{}",
                e.node_id,
                e.threshold,
                e.result_id,
                mark_label(Some(e.mark()))
            )
        })
        .collect()
}

/// Pre-order tree with one level of indentation per depth.
pub fn tree_lines(nodes: &[TreeNode]) -> Vec<String> {
    nodes
        .iter()
        .map(|n| {
            format!(
                "{}{} {}{}",
                "  ".repeat(n.depth),
                n.id,
                format!("({})", n.weight).dimmed(),
                mark_label(n.mark)
            )
        })
        .collect()
}

fn raw_row(row: &LogRow) -> String {
    let line = format!("{}{}", "  ".repeat(row.depth), format_event(&row.node_id, &row.event));
    if row.on_goal_path {
        line.green().to_string()
    } else {
        line
    }
}

pub fn raw_lines(log: &RawLog) -> Vec<String> {
    let mut out = Vec::new();
    for seg in &log.segments {
        let cut = if seg.truncated { " (cut at spawn)" } else { "" };
        out.push(format!("--- {}{}", seg.node_id, cut).dimmed().to_string());
        for row in &log.rows[seg.start..seg.start + seg.len] {
            out.push(raw_row(row));
            push_notes(&mut out, "", &row.event);
        }
    }
    out
}

fn op_row(row: &OpRow) -> String {
    let line = format!("{}{}", "| ".repeat(row.indent), format_event(&row.node_id, &row.event));
    if row.on_goal_path {
        line.green().to_string()
    } else {
        line
    }
}

pub fn normalized_lines(log: &NormalizedLog) -> Vec<String> {
    let mut out: Vec<String> = log.rows.iter().map(op_row).collect();
    for (idx, frame) in log.spans.broken() {
        out.push(
            format!("unterminated span #{} {:?} from row {}", idx, frame.label, frame.start)
                .yellow()
                .to_string(),
        );
    }
    if log.dropped_pre_ops > 0 {
        out.push(format!("{} unmatched preOp dropped", log.dropped_pre_ops).dimmed().to_string());
    }
    out
}
