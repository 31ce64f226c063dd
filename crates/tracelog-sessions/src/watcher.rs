use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde::Serialize;
use tokio::sync::broadcast;

/// Changes to a watched trace file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    Changed { path: PathBuf },
    Removed { path: PathBuf },
}

/// Watches one trace file and emits a [`TraceEvent`] whenever it changes.
pub struct TraceWatcher {
    tx: broadcast::Sender<TraceEvent>,
    path: PathBuf,
    _watcher: RecommendedWatcher,
}

impl TraceWatcher {
    /// The parent directory is watched so editors that replace the file on
    /// save are still seen.
    pub fn new(path: &Path) -> Result<Self> {
        let path = path
            .canonicalize()
            .with_context(|| format!("Failed to resolve {}", path.display()))?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .with_context(|| format!("{} has no parent directory", path.display()))?;

        let (tx, _) = broadcast::channel(64);
        let tx_clone = tx.clone();
        let target = path.clone();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => Self::handle_event(&tx_clone, &target, &event),
                Err(e) => tracing::warn!(error = %e, "Trace watcher error"),
            }
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;
        tracing::info!(path = %path.display(), "Watching trace file");

        Ok(Self {
            tx,
            path,
            _watcher: watcher,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TraceEvent> {
        self.tx.subscribe()
    }

    fn handle_event(tx: &broadcast::Sender<TraceEvent>, target: &Path, event: &Event) {
        if !event.paths.iter().any(|p| p == target) {
            return;
        }
        let path = target.to_path_buf();
        let trace_event = match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) => Some(TraceEvent::Changed { path }),
            EventKind::Remove(_) => Some(TraceEvent::Removed { path }),
            _ => None,
        };
        if let Some(evt) = trace_event {
            tracing::debug!(event = ?evt, "Trace file event");
            let _ = tx.send(evt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn event(kind: EventKind, path: &Path) -> Event {
        Event::new(kind).add_path(path.to_path_buf())
    }

    #[test]
    fn test_events_filtered_to_target() {
        let (tx, mut rx) = broadcast::channel(8);
        let target = Path::new("/traces/run.json");

        let other = Path::new("/traces/other.json");
        for ev in [
            event(EventKind::Modify(ModifyKind::Any), other),
            event(EventKind::Create(CreateKind::File), target),
            event(EventKind::Remove(RemoveKind::File), target),
        ] {
            TraceWatcher::handle_event(&tx, target, &ev);
        }

        assert_eq!(rx.try_recv().unwrap(), TraceEvent::Changed { path: target.into() });
        assert_eq!(rx.try_recv().unwrap(), TraceEvent::Removed { path: target.into() });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_watch_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TraceWatcher::new(&dir.path().join("nope.json")).is_err());
    }
}
