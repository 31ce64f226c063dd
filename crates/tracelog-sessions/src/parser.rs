use std::collections::HashMap;
use std::io::{BufRead, Read};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use crate::id::MachId;
use crate::index::Rejected;
use crate::kv::{parse_value, scan_kvs, unquote};
use crate::types::{Event, EventKind, Extra, Session};

lazy_static! {
    /// `[file.go:12: ]root(parent:mach) rest`
    static ref LINE_PAT: Regex =
        Regex::new(r"(?:\w+\.\w+:\d+: +|^)(\d+)\((\d+):(\d+)\) +(.+)").unwrap();
    /// `# count action @0xip [kvs]`
    static ref REC_PAT: Regex =
        Regex::new(r"# +(\d+) +(.+) +@0x([0-9a-zA-Z]+)(?: +(.+))?").unwrap();
    static ref MARK_PAT: Regex = Regex::new(r"^(\+\+\+|===|\.\.\.|>>>)\s*").unwrap();
    static ref MID_PAT: Regex = Regex::new(r"(\d+)\((\d+):(\d+)\)").unwrap();
}

/// Sessions read from a trace, plus the records that could not be decoded.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    pub sessions: Vec<Session>,
    pub rejected: Vec<Rejected>,
}

impl From<Vec<Session>> for Trace {
    fn from(sessions: Vec<Session>) -> Self {
        Self {
            sessions,
            rejected: Vec::new(),
        }
    }
}

/// Parse a JSON array of session records. An element that does not decode
/// as a session is skipped and reported; the rest still load.
pub fn parse_json<R: Read>(reader: R) -> Result<Trace> {
    let elements: Vec<Value> =
        serde_json::from_reader(reader).with_context(|| "Failed to parse session array")?;
    let mut trace = Trace::default();
    for (n, element) in elements.into_iter().enumerate() {
        let id = element_id(&element, n);
        match serde_json::from_value::<Session>(element) {
            Ok(mut sess) => {
                fill_values(&mut sess);
                trace.sessions.push(sess);
            }
            Err(e) => {
                tracing::warn!(element = n, id = %id, "Skipping session record: {}", e);
                trace.rejected.push(Rejected {
                    id,
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(trace)
}

/// Best-effort label for an array element: its `id` if it has one.
fn element_id(element: &Value, n: usize) -> String {
    match element.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => format!("[{}]", n),
    }
}

/// Parse raw trace log text into session records, in order of first appearance.
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Trace> {
    let mut builder = TraceBuilder::default();
    for (n, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read trace line {}", n + 1))?;
        builder.feed(&line);
    }
    Ok(builder.finish().into())
}

/// Sessions dumped without a `values` field report their outputs as `End`
/// key/values; fold those into `values`.
fn fill_values(sess: &mut Session) {
    if sess.values.is_empty() && !sess.extra.is_empty() {
        sess.values = sess
            .extra
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
    }
}

enum Line<'a> {
    Record {
        count: u64,
        action: &'a str,
        ip: u64,
        rest: &'a str,
    },
    Note(&'a str),
}

fn parse_line(rest: &str) -> Line<'_> {
    let Some(caps) = REC_PAT.captures(rest) else {
        return Line::Note(rest);
    };
    Line::Record {
        count: caps[1].parse().unwrap_or(0),
        action: caps.get(2).map_or("", |m| m.as_str()).trim_end(),
        ip: u64::from_str_radix(&caps[3], 16).unwrap_or(0),
        rest: caps.get(4).map_or("", |m| m.as_str()),
    }
}

fn extract_mid(s: &str) -> Option<MachId> {
    let caps = MID_PAT.captures(s)?;
    Some(MachId::new(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    ))
}

/// Key/values of a record tail, `child=` normalized to a canonical id.
fn parse_extra(rest: &str) -> Extra {
    let mut map = Map::new();
    scan_kvs(rest, |k, v| {
        let value = if k == "child" {
            extract_mid(v)
                .map(|mid| Value::String(mid.to_string()))
                .unwrap_or_else(|| parse_value(v))
        } else {
            parse_value(v)
        };
        map.insert(k.to_string(), value);
    });
    Extra::from_map(map)
}

#[derive(Default)]
struct TraceBuilder {
    sessions: HashMap<MachId, Session>,
    order: Vec<MachId>,
    current: Option<MachId>,
    stray: usize,
}

impl TraceBuilder {
    fn session(&mut self, mid: MachId) -> &mut Session {
        if !self.sessions.contains_key(&mid) {
            self.order.push(mid);
        }
        self.sessions
            .entry(mid)
            .or_insert_with(|| Session::new(&mid.to_string(), None))
    }

    fn extend(&mut self, line: &str) {
        match self.current {
            Some(mid) => self.session(mid).unknown.push(line.to_string()),
            None => self.stray += 1,
        }
    }

    fn feed(&mut self, line: &str) {
        let line = line.trim_end_matches([' ', '\r', '\n']);
        let Some(caps) = LINE_PAT.captures(line) else {
            self.extend(line);
            return;
        };
        let mid = match (caps[1].parse(), caps[2].parse(), caps[3].parse()) {
            (Ok(r), Ok(p), Ok(m)) => MachId::new(r, p, m),
            _ => {
                self.extend(line);
                return;
            }
        };
        let rest = caps.get(4).map_or("", |m| m.as_str());

        match parse_line(rest) {
            Line::Note(text) => {
                let text = strip_mark(text).1;
                let sess = self.session(mid);
                match sess.records.last_mut() {
                    Some(last) => last.notes.push(text.to_string()),
                    None => {
                        let mut ev = Event::new(EventKind::Other, 0, "");
                        ev.notes.push(text.to_string());
                        sess.records.push(ev);
                    }
                }
                self.current = Some(mid);
            }
            Line::Record {
                count,
                action,
                ip,
                rest,
            } => {
                let (mark, action) = strip_mark(action);
                let action = action.trim();
                let kind = match (mark, action) {
                    (Some(">>>"), _) => EventKind::PreOp,
                    (Some("..."), _) => EventKind::PostOp,
                    (Some("+++"), _) => EventKind::Copy,
                    (Some("==="), "Begin") => EventKind::Begin,
                    (Some("==="), "End") => EventKind::End,
                    _ => EventKind::Other,
                };
                let event = Event::new(kind, count, action)
                    .with_ip(ip)
                    .with_extra(parse_extra(rest));

                if kind == EventKind::End {
                    let sess = self.session(mid);
                    scan_kvs(rest, |k, v| match k {
                        "err" => sess.error = unquote(v),
                        _ => {
                            sess.extra.insert(k.to_string(), v.to_string());
                        }
                    });
                }

                if kind == EventKind::Copy {
                    if let Some(child) = event.extra.child.as_deref().and_then(extract_mid) {
                        self.add_co_copy(mid, child, &event);
                    }
                }

                self.session(mid).records.push(event);
                self.current = if action == "Handle" { None } else { Some(mid) };
            }
        }
    }

    /// Mirror a parent's `copy` onto the child's stream as a parent link.
    fn add_co_copy(&mut self, parent: MachId, child: MachId, copy: &Event) {
        let mut extra = copy.extra.clone();
        extra.child = None;
        extra.parent = Some(parent.to_string());
        let event = Event {
            kind: EventKind::Copy,
            count: copy.count,
            ip: copy.ip,
            action: copy.action.clone(),
            extra,
            notes: Vec::new(),
        };
        let sess = self.session(child);
        sess.parent_id = Some(parent.to_string());
        sess.records.push(event);
    }

    fn finish(self) -> Vec<Session> {
        if self.stray > 0 {
            tracing::debug!(lines = self.stray, "Ignored trace lines before any session");
        }
        let TraceBuilder {
            mut sessions,
            order,
            ..
        } = self;
        order
            .into_iter()
            .filter_map(|mid| sessions.remove(&mid))
            .map(|mut sess| {
                fill_values(&mut sess);
                sess
            })
            .collect()
    }
}

fn strip_mark(s: &str) -> (Option<&str>, &str) {
    match MARK_PAT.captures(s) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.end());
            (caps.get(1).map(|m| m.as_str()), &s[whole..])
        }
        None => (None, s),
    }
}
