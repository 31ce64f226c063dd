//! Normalized log: `preOp`/`copy`/`postOp` triples folded into single
//! operations, with nested spans reconstructed from their markers.

use serde::Serialize;

use crate::assemble::Segment;
use crate::error::TraceError;
use crate::index::SessionIndex;
use crate::results::ResultMap;
use crate::span::{SpanBuilder, SpanTree};
use crate::types::{Event, EventKind, Extra};

const END_ACTION: &str = "End";

/// One row of the normalized log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpRow {
    pub depth: usize,
    pub node_id: String,
    pub mach: u64,
    /// Number of spans open around this row.
    pub indent: usize,
    #[serde(flatten)]
    pub event: Event,
    pub on_goal_path: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedLog {
    pub rows: Vec<OpRow>,
    pub spans: SpanTree,
    pub segments: Vec<Segment>,
    /// `preOp` events that never met their `postOp`.
    pub dropped_pre_ops: usize,
}

/// Fold a `postOp` with whatever was buffered before it.
fn merge_op(post: &Event, pre: Option<&Event>, copy: Option<&Extra>) -> Event {
    let mut merged = post.clone();
    if let Some(copy) = copy {
        merged.extra.merge_from(copy);
    }
    if let Some(pre) = pre {
        if !pre.extra.labels.is_empty() {
            merged.extra.labels = pre.extra.labels.clone();
        }
        if pre.extra.span_open.is_some() {
            merged.extra.span_open = pre.extra.span_open.clone();
        }
        if pre.extra.span_close.is_some() {
            merged.extra.span_close = pre.extra.span_close.clone();
        }
    }
    merged
}

struct Reconstructor<'a> {
    results: Option<&'a ResultMap>,
    spans: SpanBuilder,
    log: NormalizedLog,
}

impl Reconstructor<'_> {
    fn push(&mut self, depth: usize, node_id: &str, mach: u64, event: Event, indent: usize) {
        let on_goal_path = self.results.is_some_and(|r| r.on_path(mach, event.count));
        self.log.rows.push(OpRow {
            depth,
            node_id: node_id.to_string(),
            mach,
            indent,
            event,
            on_goal_path,
        });
    }

    /// Emit a merged operation, closing then opening spans around it.
    fn emit_op(&mut self, depth: usize, node_id: &str, mach: u64, op: Event) {
        let row = self.log.rows.len();
        let labels = &op.extra.labels;
        if let Some(close) = op.extra.span_close.as_ref() {
            self.spans.close(close.resolve(labels), row);
        }
        let indent = self.spans.depth();
        if let Some(open) = op.extra.span_open.as_ref() {
            self.spans.open(open.resolve(labels), row);
        }
        self.push(depth, node_id, mach, op, indent);
    }

    /// `End` terminates every span, including one a dangling `preOp` was
    /// about to open.
    fn emit_end(&mut self, depth: usize, node_id: &str, mach: u64, end: Event, pre: Option<Event>) {
        let row = self.log.rows.len();
        if let Some(pre) = pre {
            if let Some(open) = pre.extra.span_open.as_ref() {
                self.spans.open(open.resolve(&pre.extra.labels), row);
            }
            self.drop_pre_op(node_id, &pre);
        }
        self.spans.close_all(row);
        self.push(depth, node_id, mach, end, 0);
    }

    fn drop_pre_op(&mut self, node_id: &str, pre: &Event) {
        tracing::debug!(node = %node_id, count = pre.count, action = %pre.action, "Dropping unmatched preOp");
        self.log.dropped_pre_ops += 1;
    }
}

/// The root-to-`id` log as merged operations with reconstructed spans.
/// Ancestors stop right after the operation that spawned the next node.
pub fn assemble_normalized(
    index: &SessionIndex,
    results: Option<&ResultMap>,
    id: &str,
) -> Result<NormalizedLog, TraceError> {
    let chain = index.chain(id)?;
    let mut rec = Reconstructor {
        results,
        spans: SpanBuilder::default(),
        log: NormalizedLog::default(),
    };

    for (depth, node) in chain.iter().enumerate() {
        let node_id = node.id();
        let mach = node.mid.mach;
        let successor = chain.get(depth + 1).map(|s| s.id());
        let start = rec.log.rows.len();

        let mut pending_pre: Option<Event> = None;
        let mut pending_copy: Option<Extra> = None;
        let mut stop_after_op = false;
        let mut stopped = false;
        let records = &node.session.records;

        for (i, ev) in records.iter().enumerate() {
            match ev.kind {
                EventKind::Begin => {
                    if depth == 0 {
                        rec.push(depth, node_id, mach, ev.clone(), rec.spans.depth());
                    }
                }
                EventKind::PreOp => {
                    if let Some(old) = pending_pre.replace(ev.clone()) {
                        rec.drop_pre_op(node_id, &old);
                    }
                }
                EventKind::Copy => {
                    if successor.is_some_and(|s| ev.copies_to(s)) {
                        stop_after_op = true;
                    }
                    pending_copy = Some(ev.extra.clone());
                }
                EventKind::PostOp => {
                    let op = merge_op(ev, pending_pre.as_ref(), pending_copy.as_ref());
                    pending_pre = None;
                    pending_copy = None;
                    rec.emit_op(depth, node_id, mach, op);
                    if stop_after_op {
                        stopped = i + 1 < records.len();
                        break;
                    }
                }
                _ if ev.action == END_ACTION => {
                    rec.emit_end(depth, node_id, mach, ev.clone(), pending_pre.take());
                }
                _ => {
                    rec.push(depth, node_id, mach, ev.clone(), rec.spans.depth());
                }
            }
        }

        if let Some(pre) = pending_pre.take() {
            rec.drop_pre_op(node_id, &pre);
        }

        rec.log.segments.push(Segment {
            node_id: node_id.to_string(),
            mach,
            depth,
            start,
            len: rec.log.rows.len() - start,
            truncated: stopped,
        });
    }

    let Reconstructor { spans, mut log, .. } = rec;
    log.spans = spans.finish();
    Ok(log)
}
