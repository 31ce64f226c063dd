//! Explorer: the loaded index plus the selected run, and everything the
//! front ends ask of them.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::address::Address;
use crate::assemble::{assemble_raw, RawLog};
use crate::error::TraceError;
use crate::id::MachId;
use crate::index::{LoadReport, SessionIndex};
use crate::normalize::{assemble_normalized, NormalizedLog};
use crate::outcome::OutcomeBucket;
use crate::parser::Trace;
use crate::path::{PathLookup, PathNode};
use crate::results::ResultMap;
use crate::run::{Run, TreeNode};

const EVENT_CAPACITY: usize = 256;

/// Selection changes, broadcast to subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExplorerEvent {
    Loaded { sessions: usize, roots: usize },
    RootSelected { root_id: String, mach: u64 },
    NodeSelected { id: String, raw: bool },
    Cleared { address: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootSummary {
    pub id: String,
    pub mach: u64,
    pub sessions: usize,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", content = "rows", rename_all = "snake_case")]
pub enum NodeLog {
    Raw(RawLog),
    Normalized(NormalizedLog),
}

/// Outcome of following a deep-link address.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Navigation {
    Log {
        address: String,
        path: Vec<PathNode>,
        log: NodeLog,
    },
    /// The address could not be followed; `address` is where the view
    /// falls back to.
    Cleared { address: String, reason: String },
}

impl Navigation {
    pub fn address(&self) -> &str {
        match self {
            Self::Log { address, .. } | Self::Cleared { address, .. } => address,
        }
    }
}

pub struct Explorer {
    index: Arc<SessionIndex>,
    active: Option<Arc<Run>>,
    tx: broadcast::Sender<ExplorerEvent>,
}

impl Explorer {
    pub fn load(trace: impl Into<Trace>) -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self::load_with_channel(trace, tx)
    }

    /// Load into an existing channel, so subscribers survive a reload.
    pub fn load_with_channel(trace: impl Into<Trace>, tx: broadcast::Sender<ExplorerEvent>) -> Self {
        let index = SessionIndex::build(trace);
        let _ = tx.send(ExplorerEvent::Loaded {
            sessions: index.len(),
            roots: index.roots().count(),
        });
        Self {
            index: Arc::new(index),
            active: None,
            tx,
        }
    }

    pub fn index(&self) -> &SessionIndex {
        &self.index
    }

    pub fn report(&self) -> &LoadReport {
        self.index.report()
    }

    pub fn active(&self) -> Option<Arc<Run>> {
        self.active.clone()
    }

    pub fn sender(&self) -> broadcast::Sender<ExplorerEvent> {
        self.tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExplorerEvent> {
        self.tx.subscribe()
    }

    pub fn roots(&self) -> Vec<RootSummary> {
        let active = self.active.as_ref().map(|r| r.root_mach());
        self.index
            .roots()
            .map(|r| RootSummary {
                id: r.id().to_string(),
                mach: r.mid.mach,
                sessions: self.index.run_size(r.mid.mach),
                active: active == Some(r.mid.mach),
            })
            .collect()
    }

    /// Switch to the run rooted at `mach`. Unknown roots leave the current
    /// run in place.
    pub fn select_root(&mut self, mach: u64) -> bool {
        let Some(run) = self.index.select_root(mach) else {
            tracing::debug!(mach, "Not a root; selection unchanged");
            return false;
        };
        let event = ExplorerEvent::RootSelected {
            root_id: run.root_id().to_string(),
            mach,
        };
        self.active = Some(Arc::new(run));
        let _ = self.tx.send(event);
        true
    }

    /// Select the first root, if any, when nothing is selected yet.
    pub fn select_default(&mut self, preferred: Option<u64>) -> bool {
        if let Some(mach) = preferred {
            if self.select_root(mach) {
                return true;
            }
        }
        let first = self.index.roots().next().map(|r| r.mid.mach);
        match first {
            Some(mach) => self.select_root(mach),
            None => false,
        }
    }

    fn run(&self) -> Result<&Run, TraceError> {
        self.active.as_deref().ok_or(TraceError::NoActiveRun)
    }

    pub fn resolve_path(&self, id: &str) -> Result<PathLookup, TraceError> {
        self.run()?.resolve_path(&self.index, id)
    }

    pub fn assemble_raw(&self, id: &str) -> Result<RawLog, TraceError> {
        assemble_raw(&self.index, self.results(), id)
    }

    pub fn assemble_normalized(&self, id: &str) -> Result<NormalizedLog, TraceError> {
        assemble_normalized(&self.index, self.results(), id)
    }

    pub fn outcome_buckets(&self) -> Vec<OutcomeBucket> {
        self.active
            .as_ref()
            .map(|r| r.outcome_buckets())
            .unwrap_or_default()
    }

    pub fn results(&self) -> Option<&ResultMap> {
        self.active.as_deref().map(Run::results)
    }

    pub fn tree(&self) -> &[TreeNode] {
        self.active.as_deref().map(Run::nodes).unwrap_or(&[])
    }

    fn root_address(&self) -> String {
        self.active
            .as_ref()
            .map(|r| Address::node(r.root_id()).to_string())
            .unwrap_or_default()
    }

    fn clear(&self, reason: String) -> Navigation {
        let address = self.root_address();
        tracing::debug!(%address, %reason, "Navigation cleared");
        let _ = self.tx.send(ExplorerEvent::Cleared {
            address: address.clone(),
            reason: reason.clone(),
        });
        Navigation::Cleared { address, reason }
    }

    /// Follow a deep-link address. Never fails: anything that cannot be
    /// shown falls back to the active root.
    pub fn navigate(&mut self, address: &str) -> Navigation {
        let addr = match Address::parse(address) {
            Ok(Some(addr)) => addr,
            Ok(None) => return self.clear("empty address".to_string()),
            Err(e) => return self.clear(e.to_string()),
        };

        if let Ok(mid) = MachId::decode(&addr.id) {
            let switch = self.active.as_ref().map(|r| r.root_mach()) != Some(mid.root);
            if switch && !self.select_root(mid.root) {
                return self.clear(format!("unknown run {}", mid.root));
            }
        }

        match self.show(&addr) {
            Ok(nav) => {
                let _ = self.tx.send(ExplorerEvent::NodeSelected {
                    id: addr.id.clone(),
                    raw: addr.raw,
                });
                nav
            }
            Err(e) => self.clear(e.to_string()),
        }
    }

    fn show(&self, addr: &Address) -> Result<Navigation, TraceError> {
        let path = match self.resolve_path(&addr.id)? {
            PathLookup::Path(nodes) => nodes,
            PathLookup::Empty => {
                return Err(TraceError::broken(&addr.id, "not in the active run"));
            }
        };
        let log = if addr.raw {
            NodeLog::Raw(self.assemble_raw(&addr.id)?)
        } else {
            NodeLog::Normalized(self.assemble_normalized(&addr.id)?)
        };
        Ok(Navigation::Log {
            address: addr.to_string(),
            path,
            log,
        })
    }
}
