//! Logging initialization.
//!
//! Logs always go to stdout. `RUST_LOG` overrides the filter built here.

use quotedesk_util::log::{self, LogConfig, LogLevel};
use std::path::PathBuf;

/// Crates whose logs are enabled by the default filter.
const LOG_TARGETS: &[&str] = &[
    "quotedesk",
    "quotedesk_core",
    "quotedesk_server",
    "quotedesk_storage",
    "tower_http",
];

/// Build the filter directives for the given verbosity.
///
/// `verbose` forces debug; otherwise the configured level applies, falling
/// back to info.
pub fn log_directives(verbose: bool, level: Option<LogLevel>) -> String {
    let level = if verbose {
        LogLevel::Debug
    } else {
        level.unwrap_or_default()
    };

    LOG_TARGETS
        .iter()
        .map(|target| format!("{target}={}", level.as_str()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize logging. Returns the log file path when file logging is on.
pub fn init_logging(
    verbose: bool,
    to_file: bool,
    level: Option<LogLevel>,
) -> anyhow::Result<Option<PathBuf>> {
    let file = if to_file {
        let path = log::default_log_path();
        if path.is_none() {
            eprintln!("Warning: Could not determine log directory, logging to stdout only");
        }
        path
    } else {
        None
    };

    log::init(LogConfig {
        print: true,
        level: level.unwrap_or_default(),
        directives: Some(log_directives(verbose, level)),
        include_location: verbose,
        file: file.clone(),
    })?;

    Ok(file)
}
