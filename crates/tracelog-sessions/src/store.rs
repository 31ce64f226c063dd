use std::collections::BTreeSet;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;

use crate::parser::{parse_json, parse_trace, Trace};
use crate::types::Session;

lazy_static! {
    static ref HALT_PAT: Regex = Regex::new(r"HALT\((\d+)\)").unwrap();
}

/// Options applied while loading a trace.
#[derive(Debug, Default, Clone)]
pub struct LoadOptions {
    /// Sessions that halted with one of these codes are dropped.
    pub ignore_halt_codes: BTreeSet<u64>,
}

/// Where trace data is read from.
#[derive(Debug, Clone)]
enum Source {
    File(PathBuf),
    Stdin,
}

/// Provides access to a trace on disk (or stdin).
pub struct SessionStore {
    source: Source,
}

impl SessionStore {
    /// Read from a trace file, either a JSON session array or raw trace text.
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            source: Source::File(path),
        }
    }

    pub fn from_stdin() -> Self {
        Self {
            source: Source::Stdin,
        }
    }

    /// The backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::File(p) => Some(p),
            Source::Stdin => None,
        }
    }

    /// Read and parse every session, applying `opts`.
    pub fn load(&self, opts: &LoadOptions) -> Result<Trace> {
        let mut buf = Vec::new();
        match &self.source {
            Source::File(path) => {
                let mut file = std::fs::File::open(path)
                    .with_context(|| format!("Failed to open trace file: {:?}", path))?;
                file.read_to_end(&mut buf)
                    .with_context(|| format!("Failed to read trace file: {:?}", path))?;
            }
            Source::Stdin => {
                std::io::stdin()
                    .read_to_end(&mut buf)
                    .with_context(|| "Failed to read trace from stdin")?;
            }
        }

        let mut trace = parse_bytes(&buf)?;
        let total = trace.sessions.len();
        trace.sessions = filter_halted(trace.sessions, &opts.ignore_halt_codes);
        tracing::debug!(
            total,
            kept = trace.sessions.len(),
            rejected = trace.rejected.len(),
            "Loaded trace sessions"
        );
        Ok(trace)
    }
}

/// Sniff the payload: a JSON array starts with `[`, anything else is trace text.
pub fn parse_bytes(buf: &[u8]) -> Result<Trace> {
    let is_json = buf
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'[');
    if is_json {
        parse_json(Cursor::new(buf))
    } else {
        parse_trace(BufReader::new(Cursor::new(buf)))
    }
}

/// The halt code reported in a session error, e.g. `HALT(3)`.
pub fn halt_code(error: &str) -> Option<u64> {
    HALT_PAT
        .captures(error)
        .and_then(|caps| caps[1].parse().ok())
}

fn filter_halted(sessions: Vec<Session>, ignored: &BTreeSet<u64>) -> Vec<Session> {
    if ignored.is_empty() {
        return sessions;
    }
    sessions
        .into_iter()
        .filter(|s| !halt_code(&s.error).is_some_and(|code| ignored.contains(&code)))
        .collect()
}
