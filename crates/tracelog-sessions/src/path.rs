use serde::Serialize;

use crate::error::TraceError;
use crate::id::MachId;
use crate::index::SessionIndex;
use crate::results::Mark;
use crate::run::Run;

/// A step of a resolved path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathNode {
    pub id: String,
    pub mach: u64,
    pub depth: usize,
    /// Index into the run's tree.
    pub node: usize,
    pub mark: Option<Mark>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "lookup", content = "nodes", rename_all = "snake_case")]
pub enum PathLookup {
    /// Root-to-leaf nodes of the target.
    Path(Vec<PathNode>),
    /// The target belongs to another run.
    Empty,
}

impl PathLookup {
    pub fn nodes(&self) -> &[PathNode] {
        match self {
            Self::Path(nodes) => nodes,
            Self::Empty => &[],
        }
    }
}

impl Run {
    /// Locate `id` in this run's tree by descending one level per ancestor.
    pub fn resolve_path(&self, index: &SessionIndex, id: &str) -> Result<PathLookup, TraceError> {
        let mid = MachId::decode(id)?;
        if mid.root != self.root_mach() {
            return Ok(PathLookup::Empty);
        }

        let machs: Vec<u64> = index.chain(id)?.iter().map(|e| e.mid.mach).collect();
        let Some((&first, rest)) = machs.split_first() else {
            return Err(TraceError::broken(id, "empty ancestor chain"));
        };
        if first != self.root_mach() {
            return Err(TraceError::broken(
                id,
                format!("chain starts at {} not at root {}", first, self.root_mach()),
            ));
        }

        let mut cur = 0;
        let mut idxs = vec![cur];
        for &mach in rest {
            cur = self.find_child(cur, mach).ok_or_else(|| {
                let at = self.node(cur).map_or("?", |n| n.id.as_str());
                TraceError::broken(id, format!("no child {} under {}", mach, at))
            })?;
            idxs.push(cur);
        }

        let nodes = idxs
            .into_iter()
            .filter_map(|idx| {
                self.node(idx).map(|n| PathNode {
                    id: n.id.clone(),
                    mach: n.mach,
                    depth: n.depth,
                    node: idx,
                    mark: n.mark,
                })
            })
            .collect();
        Ok(PathLookup::Path(nodes))
    }
}
