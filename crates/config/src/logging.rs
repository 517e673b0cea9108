//! Logging configuration for the mise-seq CLI
//!
//! Compact terminal output on stderr plus optional file logging using tracing.

use crate::Result;
use miseseq_core::Error;
use std::path::Path;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Crates whose events are shown by default
const TARGETS: &[&str] = &["mise_seq", "miseseq", "miseseq_config", "miseseq_engine"];

/// Build the default filter directive for a level
fn default_directive(level: &str) -> String {
    TARGETS
        .iter()
        .map(|t| format!("{t}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize the logging system
///
/// # Arguments
/// * `verbose` - Enable debug level logging and timestamps
/// * `log_file` - Optional path to append debug logs to
///
/// # Examples
/// ```ignore
/// // Basic usage with info level
/// init(false, None)?;
///
/// // Write logs to file
/// init(true, Some(Path::new("mise-seq.log")))?;
/// ```
pub fn init(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    // RUST_LOG overrides the default
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive(level)))
        .map_err(|e| Error::Message(format!("Invalid log filter: {e}")))?;

    let file_layer = match log_file {
        Some(log_path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)?;

            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .pretty()
                    .with_filter(EnvFilter::new(default_directive("debug"))),
            )
        }
        None => None,
    };

    let base = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_ansi(true);

    let result = if verbose {
        tracing_subscriber::registry()
            .with(file_layer)
            .with(base.with_filter(env_filter))
            .try_init()
    } else {
        // No timestamps in normal mode
        tracing_subscriber::registry()
            .with(file_layer)
            .with(base.without_time().with_filter(env_filter))
            .try_init()
    };

    result.map_err(|e| Error::Message(format!("Failed to initialize logging: {e}")))
}
