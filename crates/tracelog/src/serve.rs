use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tokio::sync::broadcast::error::RecvError;

use tracelog_sessions::{Explorer, LoadOptions, SessionStore, TraceEvent, TraceWatcher};

use crate::api::{self, AppState};

pub struct ServeOptions {
    pub addr: String,
    pub watch: bool,
    pub default_root: Option<u64>,
}

pub async fn handle_serve_command(
    explorer: Explorer,
    store: SessionStore,
    load_opts: LoadOptions,
    opts: ServeOptions,
) -> Result<()> {
    let state = AppState::new(explorer);

    let watcher = if opts.watch {
        let path = store
            .path()
            .context("--watch needs a trace file, not stdin")?;
        Some(TraceWatcher::new(path).context("Failed to start trace watcher")?)
    } else {
        None
    };
    if let Some(ref watcher) = watcher {
        let rx = watcher.subscribe();
        tokio::spawn(reload_on_change(
            rx,
            state.clone(),
            Arc::new(store),
            load_opts,
            opts.default_root,
        ));
    }

    let router = api::create_router(state);
    let listener = tokio::net::TcpListener::bind(&opts.addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", opts.addr))?;

    eprintln!();
    eprintln!(
        "  {} {}",
        "->".bright_green(),
        format!("Serving http://{}/api", opts.addr).bold()
    );
    if watcher.is_some() {
        eprintln!("  {} Reloading on trace file changes", "->".dimmed());
    }
    eprintln!("  {} Press {} to stop", "->".dimmed(), "Ctrl+C".bold());
    eprintln!();

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("API server error")
}

/// Rebuild the explorer off-lock on every change, then swap it in and
/// reselect the run that was active.
async fn reload_on_change(
    mut rx: tokio::sync::broadcast::Receiver<TraceEvent>,
    state: AppState,
    store: Arc<SessionStore>,
    load_opts: LoadOptions,
    default_root: Option<u64>,
) {
    loop {
        let event = match rx.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Coalescing trace file events");
                continue;
            }
            Err(RecvError::Closed) => return,
        };
        if let TraceEvent::Removed { path } = event {
            tracing::warn!(path = %path.display(), "Trace file removed; keeping last load");
            continue;
        }

        let (active, tx) = match state.explorer.read() {
            Ok(ex) => (ex.active().map(|r| r.root_mach()), ex.sender()),
            Err(_) => return,
        };
        let store = store.clone();
        let opts = load_opts.clone();
        let loaded = tokio::task::spawn_blocking(move || store.load(&opts)).await;

        let trace = match loaded {
            Ok(Ok(trace)) => trace,
            Ok(Err(e)) => {
                tracing::warn!(error = %format!("{:#}", e), "Reload failed; keeping last load");
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reload task failed");
                continue;
            }
        };

        let mut fresh = Explorer::load_with_channel(trace, tx);
        fresh.select_default(active.or(default_root));
        match state.explorer.write() {
            Ok(mut ex) => *ex = fresh,
            Err(_) => return,
        }
        tracing::info!("Reloaded trace");
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    eprintln!("\nShutting down...");
}
