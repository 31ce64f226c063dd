use std::fmt;

use serde::Serialize;

use crate::error::TraceError;
use crate::id::MachId;

const RAW_SUFFIX: &str = "#raw";

/// Deep-link address of a node: `#<id>` or `#<id>#raw`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    pub id: String,
    pub raw: bool,
}

impl Address {
    pub fn node(id: &str) -> Self {
        Self {
            id: id.to_string(),
            raw: false,
        }
    }

    /// `Ok(None)` for an empty address; the id must decode.
    pub fn parse(s: &str) -> Result<Option<Self>, TraceError> {
        let s = s.trim();
        let s = s.strip_prefix('#').unwrap_or(s);
        if s.is_empty() {
            return Ok(None);
        }
        let (id, raw) = match s.strip_suffix(RAW_SUFFIX) {
            Some(id) => (id, true),
            None => (s, false),
        };
        MachId::decode(id)?;
        Ok(Some(Self {
            id: id.to_string(),
            raw,
        }))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.id)?;
        if self.raw {
            f.write_str(RAW_SUFFIX)?;
        }
        Ok(())
    }
}
