//! Configuration file support for tracelog.
//!
//! Loads `tracelog.toml` from the working directory, falling back to the
//! user config directory (`~/.config/tracelog/tracelog.toml` on Linux).

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracelog_logging::LogFormat;

/// Configuration loaded from `tracelog.toml`. Command line flags win over
/// every value here.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Default log level (`RUST_LOG` still overrides it)
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    /// Also write JSON logs to this file
    pub log_file: Option<PathBuf>,
    /// Sessions halted with these codes are dropped while loading
    #[serde(default)]
    pub ignore_halt_codes: BTreeSet<u64>,
    /// Root selected when none is given on the command line
    pub default_root: Option<u64>,
    #[serde(default)]
    pub serve: ServeConfig,
}

/// `[serve]` table
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ServeConfig {
    pub addr: Option<String>,
    pub watch: Option<bool>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "tracelog.toml";

pub const DEFAULT_LOG_LEVEL: &str = "warn";
pub const DEFAULT_ADDR: &str = "127.0.0.1:4180";

impl Config {
    /// Load configuration from `working_dir`, or the user config directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if a file exists and parses successfully
    /// - `Ok(None)` if neither file exists
    /// - `Err(...)` if a file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let user = dirs::config_dir().map(|d| d.join("tracelog").join(CONFIG_FILE_NAME));
        let candidates = std::iter::once(working_dir.join(CONFIG_FILE_NAME)).chain(user);

        for path in candidates {
            if path.exists() {
                return Self::from_file(&path).map(Some);
            }
        }
        Ok(None)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn serve_addr(&self) -> &str {
        self.serve.addr.as_deref().unwrap_or(DEFAULT_ADDR)
    }
}
