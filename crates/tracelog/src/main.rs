mod api;
mod commands;
mod config;
mod output;
mod serve;

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use tracelog_logging::LogFormat;
use tracelog_sessions::{Explorer, LoadOptions, SessionStore};

use crate::commands::QueryCommand;
use crate::config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "tracelog",
    about = "Explore execution traces: run trees, goal paths and reconstructed logs",
    version,
    author
)]
struct Cli {
    /// Trace file: a JSON session array or raw trace text (`-` reads stdin)
    #[arg(short, long, global = true, default_value = "-")]
    file: PathBuf,

    /// Machine id of the root whose run is selected
    #[arg(short, long, global = true)]
    root: Option<u64>,

    /// Skip sessions that halted with these codes, e.g. 1,2
    #[arg(long, global = true, value_delimiter = ',')]
    ignore_halt_codes: Vec<u64>,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormatChoice>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Query(QueryCommand),

    /// Serve the explorer over HTTP
    Serve {
        /// Listen address (default from config, else 127.0.0.1:4180)
        #[arg(long)]
        addr: Option<String>,

        /// Reload when the trace file changes
        #[arg(long)]
        watch: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = Config::load(&working_dir)?.unwrap_or_default();

    let level = cli.log_level.as_deref().unwrap_or(config.log_level());
    let format = cli
        .log_format
        .map(LogFormat::from)
        .or(config.log_format)
        .unwrap_or_default();
    let _guard = tracelog_logging::init_tracing(level, format, config.log_file.as_deref())
        .context("Failed to open log file")?;

    let mut ignore_halt_codes: BTreeSet<u64> = config.ignore_halt_codes.clone();
    ignore_halt_codes.extend(cli.ignore_halt_codes.iter().copied());
    let load_opts = LoadOptions { ignore_halt_codes };

    let store = if cli.file.as_os_str() == "-" {
        SessionStore::from_stdin()
    } else {
        SessionStore::with_path(cli.file.clone())
    };
    let trace = store.load(&load_opts)?;
    let mut explorer = Explorer::load(trace);

    if let Some(mach) = cli.root {
        if !explorer.select_root(mach) {
            anyhow::bail!("No root session with machine id {}", mach);
        }
    } else {
        explorer.select_default(config.default_root);
    }

    match cli.command {
        Command::Query(query) => commands::handle_query_command(&mut explorer, query),
        Command::Serve { addr, watch } => {
            let opts = serve::ServeOptions {
                addr: addr.unwrap_or_else(|| config.serve_addr().to_string()),
                watch: watch || config.serve.watch.unwrap_or(false),
                default_root: cli.root.or(config.default_root),
            };
            serve::handle_serve_command(explorer, store, load_opts, opts).await
        }
    }
}
