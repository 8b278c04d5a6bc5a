//! Logging initialisation
//!
//! Installs a `tracing_subscriber` registry with an `EnvFilter`. `RUST_LOG`
//! takes priority over the configured level. Output goes to the configured
//! log file, or stderr when none is set.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialise global logging
///
/// Safe to call more than once: later calls leave the first subscriber in place.
///
/// # Errors
/// Returns `Error::Config` if the log file cannot be opened.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let (file_layer, stderr_layer) = match &config.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| Error::Config(format!("Failed to open log file {:?}: {}", path, e)))?;
            let layer = fmt::layer().with_ansi(false).with_writer(Mutex::new(file));
            (Some(layer), None)
        }
        None => (None, Some(fmt::layer().with_writer(std::io::stderr))),
    };

    // try_init fails only when a global subscriber already exists
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init();

    Ok(())
}
