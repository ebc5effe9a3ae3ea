use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use color_eyre::eyre::{Result, WrapErr, eyre};
use tracing_subscriber::EnvFilter;

/// Environment variable read when no level is given on the command line.
pub const LOG_ENV: &str = "PULSETOP_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

pub fn default_log_path() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join("pulsetop").join("pulsetop.log"))
}

/// `level` wins over `PULSETOP_LOG`; both fall back to `info`.
pub fn env_filter(level: Option<&str>) -> Result<EnvFilter> {
    match level {
        Some(directive) => {
            EnvFilter::try_new(directive).wrap_err_with(|| format!("invalid log level `{directive}`"))
        }
        None => Ok(EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))),
    }
}

/// Send `tracing` output to `path`. The terminal belongs to the dashboard,
/// so nothing is written to stdout or stderr.
pub fn init(path: &Path, level: Option<&str>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .wrap_err_with(|| format!("cannot create log directory {}", parent.display()))?;
    }
    let file = File::options()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("cannot open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .with_env_filter(env_filter(level)?)
        .with_writer(Mutex::new(file))
        .try_init()
        .map_err(|e| eyre!("failed to set tracing subscriber: {e}"))
}
