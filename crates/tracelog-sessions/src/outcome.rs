use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::Session;

pub const VALUES_BUCKET: &str = "values";
pub const UNKNOWN_BUCKET: &str = "unknown";

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum Outcome {
    Values,
    Err(String),
    Unknown,
}

impl Outcome {
    /// An error wins over values; neither means unknown.
    pub fn classify(session: &Session) -> Self {
        if !session.error.is_empty() {
            Self::Err(session.error.clone())
        } else if !session.values.is_empty() {
            Self::Values
        } else {
            Self::Unknown
        }
    }

    pub fn bucket_name(&self) -> String {
        match self {
            Self::Values => VALUES_BUCKET.to_string(),
            Self::Err(msg) => format!("err={}", msg),
            Self::Unknown => UNKNOWN_BUCKET.to_string(),
        }
    }
}

/// A named group of session ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeBucket {
    pub name: String,
    pub ids: Vec<String>,
}

/// Sessions of one run grouped by outcome.
#[derive(Debug, Clone, Default)]
pub struct OutcomeBuckets {
    buckets: BTreeMap<String, Vec<String>>,
}

impl OutcomeBuckets {
    /// Classify `sessions`; ids keep their iteration order within a bucket.
    pub fn classify<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> Self {
        let mut buckets: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for session in sessions {
            buckets
                .entry(Outcome::classify(session).bucket_name())
                .or_default()
                .push(session.id.clone());
        }
        Self { buckets }
    }

    /// Buckets sorted by name.
    pub fn sorted(&self) -> Vec<OutcomeBucket> {
        self.buckets
            .iter()
            .map(|(name, ids)| OutcomeBucket {
                name: name.clone(),
                ids: ids.clone(),
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> &[String] {
        self.buckets.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ids of goal sessions, in bucket order.
    pub fn goals(&self) -> &[String] {
        self.get(VALUES_BUCKET)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str, error: &str, values: &str) -> Session {
        let mut s = Session::new(id, None);
        s.error = error.into();
        s.values = values.into();
        s
    }

    #[test]
    fn test_classify_precedence() {
        assert_eq!(Outcome::classify(&session("1(0:1)", "", "")), Outcome::Unknown);
        assert_eq!(Outcome::classify(&session("1(0:1)", "", "x=1")), Outcome::Values);
        assert_eq!(
            Outcome::classify(&session("1(0:1)", "HALT(2)", "x=1")),
            Outcome::Err("HALT(2)".into())
        );
    }

    #[test]
    fn test_buckets_sorted_by_name_and_keep_order() {
        let sessions = vec![
            session("1(0:1)", "", ""),
            session("1(1:3)", "", "x=2"),
            session("1(1:2)", "", "x=1"),
            session("1(1:4)", "bad", ""),
        ];
        let buckets = OutcomeBuckets::classify(&sessions);
        let names: Vec<String> = buckets.sorted().into_iter().map(|b| b.name).collect();

        assert_eq!(names, vec!["err=bad", "unknown", "values"]);
        assert_eq!(buckets.goals(), &["1(1:3)".to_string(), "1(1:2)".to_string()]);
    }
}
