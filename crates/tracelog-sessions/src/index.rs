use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::TraceError;
use crate::id::MachId;
use crate::parser::Trace;
use crate::run::Run;
use crate::types::Session;

/// A session accepted into the index, with its decoded identifier.
#[derive(Debug, Clone)]
pub struct Indexed {
    pub mid: MachId,
    pub session: Session,
}

impl Indexed {
    pub fn id(&self) -> &str {
        &self.session.id
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.session.parent_id.as_deref()
    }
}

/// A record left out of the index.
#[derive(Debug, Clone, Serialize)]
pub struct Rejected {
    pub id: String,
    pub reason: String,
}

/// What happened while indexing a session set.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    /// Records that did not decode as sessions at all.
    pub unparsed: Vec<Rejected>,
    pub malformed: Vec<Rejected>,
    pub duplicates: Vec<Rejected>,
    pub loaded_at: DateTime<Utc>,
}

/// Parent/child adjacency over a loaded session set.
#[derive(Debug)]
pub struct SessionIndex {
    by_id: HashMap<String, Indexed>,
    kids: HashMap<String, Vec<String>>,
    roots: Vec<String>,
    order: Vec<String>,
    run_sizes: HashMap<u64, usize>,
    report: LoadReport,
}

impl SessionIndex {
    /// Index a trace. Malformed identifiers and duplicate machine ids are
    /// excluded and reported next to the trace's undecodable records; every
    /// other record is indexed.
    pub fn build(trace: impl Into<Trace>) -> Self {
        let Trace {
            sessions,
            rejected: unparsed,
        } = trace.into();
        let mut by_id: HashMap<String, Indexed> = HashMap::with_capacity(sessions.len());
        let mut by_mach: HashMap<u64, String> = HashMap::with_capacity(sessions.len());
        let mut kids: HashMap<String, Vec<String>> = HashMap::new();
        let mut roots: Vec<String> = Vec::new();
        let mut order: Vec<String> = Vec::with_capacity(sessions.len());
        let mut run_sizes: HashMap<u64, usize> = HashMap::new();
        let mut malformed = Vec::new();
        let mut duplicates = Vec::new();

        for session in sessions {
            let mid = match MachId::decode(&session.id) {
                Ok(mid) => mid,
                Err(e) => {
                    tracing::warn!("Skipping session: {}", e);
                    malformed.push(Rejected {
                        id: session.id,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };
            if let Some(pid) = session.parent_id.as_deref() {
                if let Err(e) = MachId::decode(pid) {
                    tracing::warn!("Skipping session {}: parent {}", session.id, e);
                    malformed.push(Rejected {
                        id: session.id.clone(),
                        reason: format!("parent: {}", e),
                    });
                    continue;
                }
            }
            if let Some(existing) = by_mach.get(&mid.mach) {
                let e = TraceError::DuplicateMachId {
                    mach: mid.mach,
                    id: session.id.clone(),
                    existing: existing.clone(),
                };
                tracing::warn!("Skipping session: {}", e);
                duplicates.push(Rejected {
                    id: session.id,
                    reason: e.to_string(),
                });
                continue;
            }

            let id = session.id.clone();
            match session.parent_id.as_deref() {
                Some(pid) => kids.entry(pid.to_string()).or_default().push(id.clone()),
                None => roots.push(id.clone()),
            }
            *run_sizes.entry(mid.root).or_insert(0) += 1;
            by_mach.insert(mid.mach, id.clone());
            order.push(id.clone());
            by_id.insert(id, Indexed { mid, session });
        }

        roots.sort_by_key(|id| by_id[id].mid.mach);

        let report = LoadReport {
            loaded: order.len(),
            unparsed,
            malformed,
            duplicates,
            loaded_at: Utc::now(),
        };
        tracing::info!(
            loaded = report.loaded,
            roots = roots.len(),
            unparsed = report.unparsed.len(),
            malformed = report.malformed.len(),
            duplicates = report.duplicates.len(),
            "Indexed sessions"
        );

        Self {
            by_id,
            kids,
            roots,
            order,
            run_sizes,
            report,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn report(&self) -> &LoadReport {
        &self.report
    }

    pub fn get(&self, id: &str) -> Option<&Indexed> {
        self.by_id.get(id)
    }

    pub fn session(&self, id: &str) -> Option<&Session> {
        self.by_id.get(id).map(|e| &e.session)
    }

    /// Children of `id` in insertion order.
    pub fn kids(&self, id: &str) -> &[String] {
        self.kids.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Indexed sessions in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Indexed> {
        self.order.iter().filter_map(|id| self.by_id.get(id))
    }

    /// Root candidates ordered by machine id.
    pub fn roots(&self) -> impl Iterator<Item = &Indexed> {
        self.roots.iter().filter_map(|id| self.by_id.get(id))
    }

    pub fn root(&self, mach: u64) -> Option<&Indexed> {
        self.roots().find(|r| r.mid.mach == mach)
    }

    /// Number of sessions whose identifier names `root_mach` as their root.
    pub fn run_size(&self, root_mach: u64) -> usize {
        self.run_sizes.get(&root_mach).copied().unwrap_or(0)
    }

    /// Build the run rooted at `mach`, or `None` if it is not a root candidate.
    pub fn select_root(&self, mach: u64) -> Option<Run> {
        let root = self.root(mach)?;
        Some(Run::build(self, root))
    }

    /// Root-to-target chain of `id`, following `parent_id`.
    pub fn chain(&self, id: &str) -> Result<Vec<&Indexed>, TraceError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut cur = self
            .get(id)
            .ok_or_else(|| TraceError::NodeNotFound(id.to_string()))?;
        loop {
            if !seen.insert(cur.mid.mach) {
                return Err(TraceError::broken(id, format!("parent cycle at {}", cur.id())));
            }
            chain.push(cur);
            match cur.parent_id() {
                None => break,
                Some(pid) => {
                    cur = self
                        .get(pid)
                        .ok_or_else(|| TraceError::NodeNotFound(pid.to_string()))?;
                }
            }
        }
        chain.reverse();
        Ok(chain)
    }
}
