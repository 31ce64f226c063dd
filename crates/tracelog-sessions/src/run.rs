//! A run: the sessions sharing one root, materialized as a tree together
//! with the outcome buckets and goal markers derived from it.

use std::collections::HashSet;

use serde::Serialize;

use crate::index::{Indexed, SessionIndex};
use crate::outcome::{OutcomeBucket, OutcomeBuckets};
use crate::results::{Mark, ResultMap};

/// One node of a run's tree. Children are indices into the run's node arena.
#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub mach: u64,
    pub depth: usize,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// `postOp` events in this node's subtree.
    pub weight: u64,
    pub mark: Option<Mark>,
}

/// Immutable state of the selected run. Built in full before it is served.
#[derive(Debug)]
pub struct Run {
    root_id: String,
    root_mach: u64,
    nodes: Vec<TreeNode>,
    members: usize,
    orphans: usize,
    outcomes: OutcomeBuckets,
    results: ResultMap,
}

impl Run {
    pub(crate) fn build(index: &SessionIndex, root: &Indexed) -> Self {
        let root_mach = root.mid.mach;
        let members: Vec<&Indexed> = index
            .iter()
            .filter(|e| e.mid.root == root_mach || e.mid.mach == root_mach)
            .collect();
        let member_ids: HashSet<&str> = members.iter().map(|e| e.id()).collect();

        let mut nodes = materialize(index, root, &member_ids);
        let orphans = members.len().saturating_sub(nodes.len());
        if orphans > 0 {
            tracing::warn!(root = %root.id(), orphans, "Run members unreachable from root");
        }

        // Load order, so the last goal loaded wins shared ancestors.
        let ordered = members.iter().map(|e| &e.session);
        let outcomes = OutcomeBuckets::classify(ordered);
        let results = ResultMap::propagate(index, outcomes.goals());
        for node in &mut nodes {
            node.mark = results.mark(node.mach);
        }

        tracing::debug!(
            root = %root.id(),
            nodes = nodes.len(),
            buckets = outcomes.len(),
            marked = results.len(),
            "Built run"
        );

        Self {
            root_id: root.id().to_string(),
            root_mach,
            nodes,
            members: members.len(),
            orphans,
            outcomes,
            results,
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn root_mach(&self) -> u64 {
        self.root_mach
    }

    /// Tree nodes in pre-order; index 0 is the root.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    pub fn node(&self, idx: usize) -> Option<&TreeNode> {
        self.nodes.get(idx)
    }

    pub fn members(&self) -> usize {
        self.members
    }

    pub fn orphans(&self) -> usize {
        self.orphans
    }

    pub fn outcomes(&self) -> &OutcomeBuckets {
        &self.outcomes
    }

    pub fn outcome_buckets(&self) -> Vec<OutcomeBucket> {
        self.outcomes.sorted()
    }

    pub fn results(&self) -> &ResultMap {
        &self.results
    }

    /// Child of `idx` with machine id `mach`.
    pub fn find_child(&self, idx: usize, mach: u64) -> Option<usize> {
        self.nodes
            .get(idx)?
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].mach == mach)
    }
}

/// Pre-order arena of the tree under `root`, restricted to `members`,
/// children by ascending machine id.
fn materialize(index: &SessionIndex, root: &Indexed, members: &HashSet<&str>) -> Vec<TreeNode> {
    let mut nodes: Vec<TreeNode> = Vec::new();
    let mut own_weight: Vec<u64> = Vec::new();
    let mut stack: Vec<(&Indexed, Option<usize>, usize)> = vec![(root, None, 0)];

    while let Some((entry, parent, depth)) = stack.pop() {
        let idx = nodes.len();
        nodes.push(TreeNode {
            id: entry.id().to_string(),
            mach: entry.mid.mach,
            depth,
            parent,
            children: Vec::new(),
            weight: 0,
            mark: None,
        });
        own_weight.push(entry.session.post_op_count());
        if let Some(p) = parent {
            nodes[p].children.push(idx);
        }

        let mut kids: Vec<&Indexed> = index
            .kids(entry.id())
            .iter()
            .filter(|id| members.contains(id.as_str()))
            .filter_map(|id| index.get(id))
            .collect();
        kids.sort_by_key(|k| std::cmp::Reverse(k.mid.mach));
        stack.extend(kids.into_iter().map(|k| (k, Some(idx), depth + 1)));
    }

    // Pre-order puts every child after its parent.
    for idx in (0..nodes.len()).rev() {
        let weight = own_weight[idx] + nodes[idx].weight;
        nodes[idx].weight = weight;
        if let Some(p) = nodes[idx].parent {
            nodes[p].weight += weight;
        }
    }

    nodes
}
