use std::path::Path;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Filter variable, e.g. `TERMIFLOW_LOG=termiflow=debug`.
pub const LOG_ENV: &str = "TERMIFLOW_LOG";

/// Route `tracing` output to an append-only file. The terminal belongs to the
/// UI, so nothing is ever written to stdout or stderr.
pub fn init_file_logging(log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory '{}'", parent.display()))?;
        }
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("failed to open log file '{}'", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    tracing::info!(path = %log_path.display(), "logging initialised");
    Ok(())
}
