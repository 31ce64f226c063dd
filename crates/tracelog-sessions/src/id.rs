//! Hierarchical session identifiers of the form `root(parent:mach)`.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TraceError;

lazy_static! {
    static ref ID_PAT: Regex = Regex::new(r"^(\d+)\((\d+):(\d+)\)$").unwrap();
}

/// Decoded identifier. `mach` is unique across a loaded session set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MachId {
    pub root: u64,
    pub parent: u64,
    pub mach: u64,
}

impl MachId {
    pub fn new(root: u64, parent: u64, mach: u64) -> Self {
        Self { root, parent, mach }
    }

    /// Parse an identifier, rejecting anything outside the grammar.
    pub fn decode(id: &str) -> Result<Self, TraceError> {
        let malformed = || TraceError::MalformedIdentifier(id.to_string());
        let caps = ID_PAT.captures(id).ok_or_else(malformed)?;
        let num = |i: usize| caps[i].parse::<u64>().map_err(|_| malformed());
        Ok(Self {
            root: num(1)?,
            parent: num(2)?,
            mach: num(3)?,
        })
    }
}

impl fmt::Display for MachId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}:{})", self.root, self.parent, self.mach)
    }
}

impl FromStr for MachId {
    type Err = TraceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode(s)
    }
}

impl Serialize for MachId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MachId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_valid() {
        let id = MachId::decode("1(0:1)").unwrap();
        assert_eq!(id, MachId::new(1, 0, 1));

        let id = MachId::decode("12(345:6789)").unwrap();
        assert_eq!(id.root, 12);
        assert_eq!(id.parent, 345);
        assert_eq!(id.mach, 6789);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        for bad in ["abc", "", "1(2:3", "1(2:3))", " 1(2:3)", "1(2;3)", "-1(2:3)", "1(2:3:4)"] {
            assert!(
                matches!(MachId::decode(bad), Err(TraceError::MalformedIdentifier(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_decode_rejects_overflow() {
        let huge = format!("1(2:{}0)", u64::MAX);
        assert!(MachId::decode(&huge).is_err());
    }

    #[test]
    fn test_display_matches_grammar() {
        let id = MachId::new(3, 1, 4);
        assert_eq!(id.to_string(), "3(1:4)");
        assert_eq!(id.to_string().parse::<MachId>().unwrap(), id);
    }
}
