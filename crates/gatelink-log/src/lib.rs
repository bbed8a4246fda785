// ABOUTME: Shared logging setup for gatelink binaries
// ABOUTME: init() logs to stderr for one-shot commands, init_file() keeps the chat terminal clean

use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Standard logging to stderr. Default: INFO level, RUST_LOG override.
/// Used by the one-shot CLI commands.
pub fn init() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();
}

/// File-based logging for the interactive chat panel. Default: WARN level, RUST_LOG override.
/// Logs to <config_dir>/gatelink/{app_name}/{app_name}.log
/// If setup fails, prints a warning to stderr and continues without logging.
pub fn init_file(app_name: &str) {
    let result = match log_dir(app_name) {
        Some(dir) => init_file_in(&dir, app_name).map(|_| ()),
        None => Err("could not determine config directory".into()),
    };
    if let Err(e) = result {
        eprintln!("Warning: failed to set up file logging: {e}");
    }
}

/// Directory that holds the log file for `app_name`.
pub fn log_dir(app_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("gatelink").join(app_name))
}

fn init_file_in(dir: &Path, app_name: &str) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(format!("{app_name}.log"));
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()))
        .with_ansi(false)
        .try_init()?;

    Ok(path)
}
