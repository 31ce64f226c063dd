use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError {
    #[error("Malformed identifier: {0:?}")]
    MalformedIdentifier(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Path to {id} broken: {reason}")]
    PathBroken { id: String, reason: String },

    #[error("Duplicate machine id {mach} ({id} already indexed as {existing})")]
    DuplicateMachId {
        mach: u64,
        id: String,
        existing: String,
    },

    #[error("No run is selected")]
    NoActiveRun,
}

impl TraceError {
    pub(crate) fn broken(id: &str, reason: impl Into<String>) -> Self {
        Self::PathBroken {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
