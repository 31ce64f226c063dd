use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// Kind of a trace event. Kinds outside the known set decode as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Begin,
    PreOp,
    PostOp,
    Copy,
    End,
    #[serde(other)]
    Other,
}

/// Label set carried by `spanOpen` / `spanClose`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanMarker {
    /// `true`: the labels at the operation's own location.
    Here,
    Labels(Vec<String>),
}

impl SpanMarker {
    fn decode(value: &Value) -> Option<Option<Self>> {
        match value {
            Value::Bool(true) => Some(Some(Self::Here)),
            Value::Bool(false) => Some(None),
            Value::String(s) => Some(Some(Self::Labels(vec![s.clone()]))),
            Value::Array(_) => string_list(value).map(|ls| Some(Self::Labels(ls))),
            _ => None,
        }
    }

    fn encode(&self) -> Value {
        match self {
            Self::Here => Value::Bool(true),
            Self::Labels(ls) => Value::Array(ls.iter().cloned().map(Value::String).collect()),
        }
    }

    /// Resolve the label set, given the labels of the operation's location.
    pub fn resolve<'a>(&'a self, location: &'a [String]) -> &'a [String] {
        match self {
            Self::Here => location,
            Self::Labels(ls) => ls,
        }
    }
}

/// Per-event extra data, decoded from the free-form mapping at ingestion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extra {
    /// Child session created by a `copy`.
    pub child: Option<String>,
    /// Session that copied this one (on the child's co-copy record).
    pub parent: Option<String>,
    /// Location labels of the instruction.
    pub labels: Vec<String>,
    pub span_open: Option<SpanMarker>,
    pub span_close: Option<SpanMarker>,
    /// Everything else, untouched.
    pub rest: BTreeMap<String, Value>,
}

const CHILD: &str = "child";
const PARENT: &str = "parent";
const LABELS: &str = "labels";
const SPAN_OPEN: &str = "spanOpen";
const SPAN_CLOSE: &str = "spanClose";

impl Extra {
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut extra = Extra::default();
        for (key, value) in map {
            let handled = match key.as_str() {
                CHILD => value.as_str().map(|s| extra.child = Some(s.to_string())),
                PARENT => value.as_str().map(|s| extra.parent = Some(s.to_string())),
                LABELS => string_list(&value).map(|ls| extra.labels = ls),
                SPAN_OPEN => SpanMarker::decode(&value).map(|m| extra.span_open = m),
                SPAN_CLOSE => SpanMarker::decode(&value).map(|m| extra.span_close = m),
                _ => None,
            };
            if handled.is_none() {
                extra.rest.insert(key, value);
            }
        }
        extra
    }

    pub fn to_map(&self) -> Map<String, Value> {
        let mut map: Map<String, Value> = self
            .rest
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if let Some(ref child) = self.child {
            map.insert(CHILD.into(), Value::String(child.clone()));
        }
        if let Some(ref parent) = self.parent {
            map.insert(PARENT.into(), Value::String(parent.clone()));
        }
        if !self.labels.is_empty() {
            map.insert(
                LABELS.into(),
                Value::Array(self.labels.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(ref m) = self.span_open {
            map.insert(SPAN_OPEN.into(), m.encode());
        }
        if let Some(ref m) = self.span_close {
            map.insert(SPAN_CLOSE.into(), m.encode());
        }
        map
    }

    /// Overlay every field set in `other` onto `self`.
    pub fn merge_from(&mut self, other: &Extra) {
        if other.child.is_some() {
            self.child = other.child.clone();
        }
        if other.parent.is_some() {
            self.parent = other.parent.clone();
        }
        if !other.labels.is_empty() {
            self.labels = other.labels.clone();
        }
        if other.span_open.is_some() {
            self.span_open = other.span_open.clone();
        }
        if other.span_close.is_some() {
            self.span_close = other.span_close.clone();
        }
        for (k, v) in &other.rest {
            self.rest.insert(k.clone(), v.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.child.is_none()
            && self.parent.is_none()
            && self.labels.is_empty()
            && self.span_open.is_none()
            && self.span_close.is_none()
            && self.rest.is_empty()
    }

    /// `k=v` rendering used by text output.
    pub fn display_pairs(&self) -> String {
        self.to_map()
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{}={}", k, s),
                other => format!("{}={}", k, other),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Serialize for Extra {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Extra {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let map = Option::<Map<String, Value>>::deserialize(deserializer)?;
        Ok(map.map(Extra::from_map).unwrap_or_default())
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_str().map(String::from))
            .collect(),
        _ => None,
    }
}

/// Accept `null` wherever a default is acceptable.
fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// One trace event of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub ip: u64,
    #[serde(default, deserialize_with = "null_default")]
    pub action: String,
    #[serde(default)]
    pub extra: Extra,
    #[serde(
        default,
        deserialize_with = "null_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub notes: Vec<String>,
}

impl Event {
    pub fn new(kind: EventKind, count: u64, action: &str) -> Self {
        Self {
            kind,
            count,
            ip: 0,
            action: action.to_string(),
            extra: Extra::default(),
            notes: Vec::new(),
        }
    }

    pub fn with_extra(mut self, extra: Extra) -> Self {
        self.extra = extra;
        self
    }

    pub fn with_ip(mut self, ip: u64) -> Self {
        self.ip = ip;
        self
    }

    /// True for a `copy` linking to the given child session.
    pub fn copies_to(&self, child_id: &str) -> bool {
        self.kind == EventKind::Copy && self.extra.child.as_deref() == Some(child_id)
    }
}

/// A session record as produced by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default, deserialize_with = "null_default")]
    pub error: String,
    #[serde(default, deserialize_with = "null_default")]
    pub values: String,
    #[serde(default, deserialize_with = "null_default")]
    pub records: Vec<Event>,
    /// Key/values reported on the session's `End` line.
    #[serde(
        default,
        deserialize_with = "null_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub extra: BTreeMap<String, String>,
    /// Raw lines that could not be parsed as records.
    #[serde(
        default,
        deserialize_with = "null_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub unknown: Vec<String>,
}

impl Session {
    pub fn new(id: &str, parent_id: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            parent_id: parent_id.map(String::from),
            error: String::new(),
            values: String::new(),
            records: Vec::new(),
            extra: BTreeMap::new(),
            unknown: Vec::new(),
        }
    }

    /// A goal is a session that finished cleanly with values.
    pub fn is_goal(&self) -> bool {
        self.error.is_empty() && !self.values.is_empty()
    }

    pub fn final_count(&self) -> u64 {
        self.records.last().map(|r| r.count).unwrap_or(0)
    }

    pub fn post_op_count(&self) -> u64 {
        self.records
            .iter()
            .filter(|r| r.kind == EventKind::PostOp)
            .count() as u64
    }

    /// Index of the first `copy` that spawned `child_id`.
    pub fn first_copy_to(&self, child_id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.copies_to(child_id))
    }

    /// Count of the last `copy` that spawned `child_id`.
    pub fn last_copy_count_to(&self, child_id: &str) -> Option<u64> {
        self.records
            .iter()
            .rev()
            .find(|r| r.copies_to(child_id))
            .map(|r| r.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extra_decodes_known_shapes() {
        let raw = json!({
            "child": "1(1:2)",
            "labels": ["loop", "body"],
            "spanOpen": true,
            "spanClose": "loop",
            "ps": [1, 2],
        });
        let extra: Extra = serde_json::from_value(raw).unwrap();

        assert_eq!(extra.child.as_deref(), Some("1(1:2)"));
        assert_eq!(extra.labels, vec!["loop", "body"]);
        assert_eq!(extra.span_open, Some(SpanMarker::Here));
        assert_eq!(extra.span_close, Some(SpanMarker::Labels(vec!["loop".into()])));
        assert_eq!(extra.rest.get("ps"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_extra_unexpected_shapes_stay_residual() {
        let raw = json!({"child": 7, "spanOpen": 3, "spanClose": false});
        let extra: Extra = serde_json::from_value(raw).unwrap();

        assert!(extra.child.is_none());
        assert!(extra.span_close.is_none());
        assert_eq!(extra.rest.get("child"), Some(&json!(7)));
        assert_eq!(extra.rest.get("spanOpen"), Some(&json!(3)));
        assert!(!extra.rest.contains_key("spanClose"));
    }

    #[test]
    fn test_event_tolerates_nulls_and_unknown_kinds() {
        let raw = json!({"kind": "hndl", "count": 3, "ip": 16, "action": "Handle", "extra": null, "notes": null});
        let event: Event = serde_json::from_value(raw).unwrap();

        assert_eq!(event.kind, EventKind::Other);
        assert!(event.extra.is_empty());
        assert!(event.notes.is_empty());
    }

    #[test]
    fn test_session_goal_and_copy_lookups() {
        let mut sess = Session::new("1(0:1)", None);
        let mut link = Extra::default();
        link.child = Some("1(1:2)".into());
        sess.records = vec![
            Event::new(EventKind::Begin, 0, "Begin"),
            Event::new(EventKind::Copy, 2, "Copy").with_extra(link.clone()),
            Event::new(EventKind::PostOp, 3, "fork"),
            Event::new(EventKind::Copy, 5, "Copy").with_extra(link),
            Event::new(EventKind::End, 6, "End"),
        ];

        assert!(!sess.is_goal());
        sess.values = "out_x=[1]".into();
        assert!(sess.is_goal());
        assert_eq!(sess.first_copy_to("1(1:2)"), Some(1));
        assert_eq!(sess.last_copy_count_to("1(1:2)"), Some(5));
        assert_eq!(sess.last_copy_count_to("1(1:3)"), None);
        assert_eq!(sess.final_count(), 6);
        assert_eq!(sess.post_op_count(), 1);
    }
}
