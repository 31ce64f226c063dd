use serde::Serialize;

use crate::error::TraceError;
use crate::index::{Indexed, SessionIndex};
use crate::results::ResultMap;
use crate::types::Event;

/// One displayed record, tagged with the chain node it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRow {
    pub depth: usize,
    pub node_id: String,
    pub mach: u64,
    #[serde(flatten)]
    pub event: Event,
    pub on_goal_path: bool,
}

/// Rows contributed by one node of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub node_id: String,
    pub mach: u64,
    pub depth: usize,
    /// Offset of the segment's first row.
    pub start: usize,
    pub len: usize,
    /// The node's stream was cut at the copy to its successor.
    pub truncated: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawLog {
    pub rows: Vec<LogRow>,
    pub segments: Vec<Segment>,
}

impl RawLog {
    /// Records of the segment at `depth`.
    pub fn segment_rows(&self, depth: usize) -> &[LogRow] {
        self.segments
            .get(depth)
            .map(|s| &self.rows[s.start..s.start + s.len])
            .unwrap_or(&[])
    }
}

/// Length of `node`'s prefix that precedes `successor`: everything up to and
/// including the first copy spawning it, or the full stream.
pub(crate) fn prefix_len(node: &Indexed, successor: Option<&Indexed>) -> (usize, bool) {
    let records = &node.session.records;
    match successor.and_then(|s| node.session.first_copy_to(s.id())) {
        Some(i) => (i + 1, i + 1 < records.len()),
        None => (records.len(), false),
    }
}

/// The root-to-`id` log with every ancestor cut at the copy that spawned
/// the next node, so no record is shown twice.
pub fn assemble_raw(
    index: &SessionIndex,
    results: Option<&ResultMap>,
    id: &str,
) -> Result<RawLog, TraceError> {
    let chain = index.chain(id)?;
    let mut log = RawLog::default();

    for (depth, node) in chain.iter().enumerate() {
        let (len, truncated) = prefix_len(node, chain.get(depth + 1).copied());
        let mach = node.mid.mach;
        log.segments.push(Segment {
            node_id: node.id().to_string(),
            mach,
            depth,
            start: log.rows.len(),
            len,
            truncated,
        });
        log.rows
            .extend(node.session.records[..len].iter().map(|ev| LogRow {
                depth,
                node_id: node.id().to_string(),
                mach,
                event: ev.clone(),
                on_goal_path: results.is_some_and(|r| r.on_path(mach, ev.count)),
            }));
    }

    Ok(log)
}
