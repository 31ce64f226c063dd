//! Nested spans over a normalized log, and their collapse state.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use serde::Serialize;

/// A region of output rows bounded by open/close markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpanFrame {
    pub label: String,
    /// Row of the operation that opened the span.
    pub start: usize,
    /// Last row inside the span; `None` if the span was never closed.
    pub end: Option<usize>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl SpanFrame {
    /// A span that was never closed, or closed before any row of its own.
    pub fn is_broken(&self) -> bool {
        self.end.map_or(true, |end| end < self.start)
    }

    /// Rows hidden when the span is collapsed (the header row stays).
    pub fn hidden_rows(&self) -> Option<RangeInclusive<usize>> {
        match self.end {
            Some(end) if !self.is_broken() && end > self.start => Some(self.start + 1..=end),
            _ => None,
        }
    }

    pub fn contains(&self, row: usize) -> bool {
        !self.is_broken() && self.end.is_some_and(|end| (self.start..=end).contains(&row))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpanTree {
    pub frames: Vec<SpanFrame>,
    /// Frames without a parent, ordered by start.
    pub roots: Vec<usize>,
}

impl SpanTree {
    pub fn get(&self, idx: usize) -> Option<&SpanFrame> {
        self.frames.get(idx)
    }

    pub fn broken(&self) -> impl Iterator<Item = (usize, &SpanFrame)> {
        self.frames.iter().enumerate().filter(|(_, f)| f.is_broken())
    }

    /// Innermost closed span containing `row`.
    pub fn innermost_at(&self, row: usize) -> Option<usize> {
        let mut found = None;
        let mut level: &[usize] = &self.roots;
        while let Some(&idx) = level.iter().find(|&&i| self.frames[i].contains(row)) {
            found = Some(idx);
            level = &self.frames[idx].children;
        }
        found
    }
}

/// `close` names `frame` exactly, or as a dotted suffix (`a.b.c` names `c`).
pub fn label_matches(close: &str, frame: &str) -> bool {
    close == frame
        || (close.len() > frame.len()
            && close.ends_with(frame)
            && close.as_bytes()[close.len() - frame.len() - 1] == b'.')
}

/// Stack machine producing a [`SpanTree`].
#[derive(Debug, Default)]
pub struct SpanBuilder {
    frames: Vec<SpanFrame>,
    stack: Vec<usize>,
}

impl SpanBuilder {
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn seal(&mut self, idx: usize, row: usize) {
        self.frames[idx].end = row.checked_sub(1);
        self.frames[idx].parent = self.stack.last().copied();
    }

    /// Close frames from the top of the stack while each matches a not yet
    /// used label of `labels`, for an operation about to land on `row`.
    /// Returns how many frames were closed.
    pub fn close(&mut self, labels: &[String], row: usize) -> usize {
        let mut unused: Vec<&str> = labels.iter().map(String::as_str).collect();
        let mut closed = 0;
        while let Some(&top) = self.stack.last() {
            let frame_label = self.frames[top].label.as_str();
            let Some(pos) = unused.iter().position(|l| label_matches(l, frame_label)) else {
                break;
            };
            unused.remove(pos);
            self.stack.pop();
            self.seal(top, row);
            closed += 1;
        }
        closed
    }

    /// Push a frame starting at `row` unless the top frame already carries
    /// one of `labels`.
    pub fn open(&mut self, labels: &[String], row: usize) -> bool {
        if let Some(&top) = self.stack.last() {
            if labels.contains(&self.frames[top].label) {
                return false;
            }
        }
        self.frames.push(SpanFrame {
            label: labels.first().cloned().unwrap_or_default(),
            start: row,
            end: None,
            parent: None,
            children: Vec::new(),
        });
        self.stack.push(self.frames.len() - 1);
        true
    }

    /// Close every open frame before `row`.
    pub fn close_all(&mut self, row: usize) {
        while let Some(top) = self.stack.pop() {
            self.seal(top, row);
        }
    }

    /// Frames still open stay unclosed and hang off the frame beneath them.
    pub fn finish(mut self) -> SpanTree {
        for (i, &idx) in self.stack.iter().enumerate() {
            self.frames[idx].parent = i.checked_sub(1).map(|below| self.stack[below]);
        }
        let mut roots = Vec::new();
        for idx in 0..self.frames.len() {
            match self.frames[idx].parent {
                Some(p) => self.frames[p].children.push(idx),
                None => roots.push(idx),
            }
        }
        let starts: Vec<usize> = self.frames.iter().map(|f| f.start).collect();
        for frame in &mut self.frames {
            frame.children.sort_by_key(|&c| starts[c]);
        }
        roots.sort_by_key(|&r| starts[r]);
        SpanTree {
            frames: self.frames,
            roots,
        }
    }
}

/// Which spans of a log are collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Collapse {
    collapsed: BTreeSet<usize>,
}

impl Collapse {
    /// Collapse a closed span. Broken or unknown spans are refused.
    pub fn collapse(&mut self, tree: &SpanTree, frame: usize) -> bool {
        match tree.get(frame) {
            Some(f) if !f.is_broken() => {
                self.collapsed.insert(frame);
                true
            }
            _ => false,
        }
    }

    /// Expand one span; nested collapsed spans stay collapsed.
    pub fn expand(&mut self, frame: usize) -> bool {
        self.collapsed.remove(&frame)
    }

    pub fn is_collapsed(&self, frame: usize) -> bool {
        self.collapsed.contains(&frame)
    }

    pub fn is_hidden(&self, tree: &SpanTree, row: usize) -> bool {
        self.collapsed.iter().any(|&idx| {
            tree.get(idx)
                .and_then(SpanFrame::hidden_rows)
                .is_some_and(|hidden| hidden.contains(&row))
        })
    }

    /// Rows of a `len`-row log that are currently shown.
    pub fn visible_rows(&self, tree: &SpanTree, len: usize) -> Vec<usize> {
        (0..len).filter(|&row| !self.is_hidden(tree, row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(ls: &[&str]) -> Vec<String> {
        ls.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_label_matches() {
        assert!(label_matches("c", "c"));
        assert!(label_matches("a.b.c", "c"));
        assert!(label_matches("a.b.c", "b.c"));
        assert!(!label_matches("a.bc", "c"));
        assert!(!label_matches("c", "a.b.c"));
    }

    #[test]
    fn test_close_innermost_first_one_frame_per_label() {
        let mut b = SpanBuilder::default();
        b.open(&labels(&["loop"]), 0);
        b.open(&labels(&["body"]), 1);
        b.open(&labels(&["loop"]), 2);

        // One "x.loop" closes only the innermost "loop" frame.
        assert_eq!(b.close(&labels(&["x.loop"]), 4), 1);
        assert_eq!(b.depth(), 2);

        // "body" matches, then "loop" matches the outermost.
        assert_eq!(b.close(&labels(&["loop", "body"]), 6), 2);
        assert_eq!(b.depth(), 0);

        let tree = b.finish();
        assert_eq!(tree.frames[2].end, Some(3));
        assert_eq!(tree.frames[2].parent, Some(1));
        assert_eq!(tree.frames[1].end, Some(5));
        assert_eq!(tree.frames[0].end, Some(5));
        assert_eq!(tree.roots, vec![0]);
        assert_eq!(tree.frames[0].children, vec![1]);
    }

    #[test]
    fn test_close_stops_at_first_mismatch() {
        let mut b = SpanBuilder::default();
        b.open(&labels(&["a"]), 0);
        b.open(&labels(&["b"]), 1);
        assert_eq!(b.close(&labels(&["a"]), 2), 0);
        assert_eq!(b.depth(), 2);
    }

    #[test]
    fn test_open_guard_is_idempotent() {
        let mut b = SpanBuilder::default();
        assert!(b.open(&labels(&["loop"]), 0));
        assert!(!b.open(&labels(&["loop", "other"]), 1));
        assert!(b.open(&labels(&["other"]), 2));
        assert_eq!(b.depth(), 2);
    }

    #[test]
    fn test_unclosed_frames_are_broken() {
        let mut b = SpanBuilder::default();
        b.open(&labels(&["a"]), 0);
        b.open(&labels(&["b"]), 3);
        let tree = b.finish();

        assert!(tree.frames.iter().all(SpanFrame::is_broken));
        assert_eq!(tree.frames[1].parent, Some(0));
        assert_eq!(tree.broken().count(), 2);
    }

    #[test]
    fn test_collapse_does_not_cascade_on_expand() {
        let mut b = SpanBuilder::default();
        b.open(&labels(&["outer"]), 0);
        b.open(&labels(&["inner"]), 2);
        b.close(&labels(&["inner"]), 5);
        b.close(&labels(&["outer"]), 7);
        let tree = b.finish();
        // outer [0, 6], inner [2, 4]

        let mut c = Collapse::default();
        assert!(c.collapse(&tree, 1));
        assert!(c.collapse(&tree, 0));
        assert_eq!(c.visible_rows(&tree, 8), vec![0, 7]);

        assert!(c.expand(0));
        assert_eq!(c.visible_rows(&tree, 8), vec![0, 1, 2, 5, 6, 7]);
        assert!(c.is_collapsed(1));
    }

    #[test]
    fn test_collapse_refuses_broken() {
        let mut b = SpanBuilder::default();
        b.open(&labels(&["a"]), 0);
        let tree = b.finish();
        let mut c = Collapse::default();
        assert!(!c.collapse(&tree, 0));
        assert!(!c.collapse(&tree, 9));
    }

    #[test]
    fn test_innermost_at() {
        let mut b = SpanBuilder::default();
        b.open(&labels(&["outer"]), 0);
        b.open(&labels(&["inner"]), 2);
        b.close(&labels(&["inner"]), 4);
        b.close(&labels(&["outer"]), 6);
        let tree = b.finish();

        assert_eq!(tree.innermost_at(1), Some(0));
        assert_eq!(tree.innermost_at(3), Some(1));
        assert_eq!(tree.innermost_at(9), None);
    }
}
