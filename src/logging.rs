//! Log file setup
//!
//! Every run appends to `~/.baking-setup/logs/setup.log`. Operator-facing
//! text goes to the terminal separately; the log keeps the detail.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "setup.log";

/// Directory holding the log file; the temp dir when there is no home.
pub fn log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".baking-setup")
        .join("logs")
}

/// Install the global subscriber writing to the log file. `RUST_LOG`
/// overrides the default `debug` filter. Returns the log file path.
pub fn init() -> Result<PathBuf> {
    let dir = log_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE)
        .build(&dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(appender)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {}", e))?;

    Ok(dir.join(LOG_FILE))
}
