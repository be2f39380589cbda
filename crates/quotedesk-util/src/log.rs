//! Logging setup using tracing.
//!
//! This module provides consistent logging configuration across quotedesk.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Logging configuration.
pub struct LogConfig {
    /// Whether to print logs to stdout.
    pub print: bool,
    /// Log level, used when neither `RUST_LOG` nor `directives` is set.
    pub level: LogLevel,
    /// Explicit filter directives, e.g. `quotedesk=debug,tower_http=info`.
    pub directives: Option<String>,
    /// Whether to include file/line info in logs.
    pub include_location: bool,
    /// Log file path (if any). Appended to, never truncated.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            print: false,
            level: LogLevel::Info,
            directives: None,
            include_location: false,
            file: None,
        }
    }
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| match &self.directives {
            Some(directives) => EnvFilter::new(directives),
            None => EnvFilter::new(self.level.as_str()),
        })
    }
}

/// Initialize logging with the given configuration.
///
/// This should be called once at application startup. A second call fails
/// because a global subscriber is already installed.
pub fn init(config: LogConfig) -> std::io::Result<()> {
    let stdout_layer = config.print.then(|| {
        fmt::layer()
            .with_target(true)
            .with_level(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
    });

    let file_layer = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(config.filter())
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(std::io::Error::other)
}

/// Get the default log file path.
pub fn default_log_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|p| p.join("quotedesk").join("logs").join("quotedesk.log"))
}
