//! Session indexing, run trees and log reconstruction for execution traces.

pub mod address;
pub mod assemble;
pub mod error;
pub mod explorer;
pub mod id;
pub mod index;
pub mod kv;
pub mod normalize;
pub mod outcome;
pub mod parser;
pub mod path;
pub mod results;
pub mod run;
pub mod span;
pub mod store;
pub mod types;
pub mod watcher;

pub use address::Address;
pub use assemble::{assemble_raw, LogRow, RawLog, Segment};
pub use error::TraceError;
pub use explorer::{Explorer, ExplorerEvent, Navigation, NodeLog, RootSummary};
pub use id::MachId;
pub use index::{Indexed, LoadReport, Rejected, SessionIndex};
pub use normalize::{assemble_normalized, NormalizedLog, OpRow};
pub use outcome::{Outcome, OutcomeBucket, OutcomeBuckets};
pub use parser::{parse_json, parse_trace, Trace};
pub use path::{PathLookup, PathNode};
pub use results::{Mark, ResultEntry, ResultMap};
pub use run::{Run, TreeNode};
pub use span::{Collapse, SpanBuilder, SpanFrame, SpanTree};
pub use store::{LoadOptions, SessionStore};
pub use types::{Event, EventKind, Extra, Session, SpanMarker};
pub use watcher::{TraceEvent, TraceWatcher};
