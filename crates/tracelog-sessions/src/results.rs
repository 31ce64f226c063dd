use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::index::SessionIndex;

/// Relationship of a node to the goal recorded for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mark {
    Goal,
    GoalPath,
}

/// Marks a node as lying on the path to a goal, up to `threshold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub node_id: String,
    pub node_mach: u64,
    /// Records of the node with `count <= threshold` lead to the goal.
    pub threshold: u64,
    pub result_id: String,
    pub result_mach: u64,
}

impl ResultEntry {
    pub fn is_goal(&self) -> bool {
        self.result_mach == self.node_mach
    }

    pub fn on_path(&self, count: u64) -> bool {
        count <= self.threshold
    }

    pub fn mark(&self) -> Mark {
        if self.is_goal() {
            Mark::Goal
        } else {
            Mark::GoalPath
        }
    }
}

/// Goal markers keyed by machine id.
#[derive(Debug, Clone, Default)]
pub struct ResultMap {
    entries: BTreeMap<u64, ResultEntry>,
}

impl ResultMap {
    /// Walk every goal up to its root, recording an entry for each node
    /// visited. Goals are processed in order; when ancestors are shared the
    /// last goal wins.
    pub fn propagate(index: &SessionIndex, goals: &[String]) -> Self {
        let mut entries = BTreeMap::new();

        for goal_id in goals {
            let Some(goal) = index.get(goal_id) else {
                continue;
            };
            let result_mach = goal.mid.mach;
            entries.insert(
                result_mach,
                ResultEntry {
                    node_id: goal_id.clone(),
                    node_mach: result_mach,
                    threshold: goal.session.final_count(),
                    result_id: goal_id.clone(),
                    result_mach,
                },
            );

            let mut seen = HashSet::from([result_mach]);
            let mut prev = goal;
            while let Some(pid) = prev.parent_id() {
                let Some(node) = index.get(pid) else {
                    tracing::warn!(goal = %goal_id, parent = %pid, "Goal ancestor not indexed");
                    break;
                };
                if !seen.insert(node.mid.mach) {
                    tracing::warn!(goal = %goal_id, at = %pid, "Parent cycle in goal ancestry");
                    break;
                }
                let threshold = node
                    .session
                    .last_copy_count_to(prev.id())
                    .unwrap_or_else(|| node.session.final_count());
                entries.insert(
                    node.mid.mach,
                    ResultEntry {
                        node_id: node.id().to_string(),
                        node_mach: node.mid.mach,
                        threshold,
                        result_id: goal_id.clone(),
                        result_mach,
                    },
                );
                prev = node;
            }
        }

        Self { entries }
    }

    pub fn get(&self, mach: u64) -> Option<&ResultEntry> {
        self.entries.get(&mach)
    }

    pub fn mark(&self, mach: u64) -> Option<Mark> {
        self.get(mach).map(ResultEntry::mark)
    }

    /// Whether the record `count` of node `mach` still leads to a goal.
    pub fn on_path(&self, mach: u64, count: u64) -> bool {
        self.get(mach).is_some_and(|e| e.on_path(count))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
