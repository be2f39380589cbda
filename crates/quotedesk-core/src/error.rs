//! Error types for the core crate.

use crate::permission::Permission;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Lock error.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Permission error.
    #[error(transparent)]
    Permission(#[from] PermissionError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] quotedesk_storage::StorageError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// Environment variable not found during substitution.
    #[error("environment variable not found: {name}")]
    EnvVarNotFound { name: String },

    /// File reference not found during substitution.
    #[error("file reference not found: {path}")]
    FileRefNotFound { path: String },

    /// Invalid path (e.g., could not determine config directory).
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Resource lock errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LockError {
    /// Another principal holds an unexpired lock on the resource.
    #[error("Resource is locked by another user")]
    ResourceLocked {
        resource_id: String,
        holder_id: String,
        acquired_at: DateTime<Utc>,
    },

    /// The caller does not hold a live lock on the resource.
    #[error("lock on {resource_id} is not held by {principal_id}")]
    NotHeld {
        resource_id: String,
        principal_id: String,
    },
}

/// Authorization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    /// The principal's role lacks one or more required permissions.
    #[error("permission denied for {principal_id}: missing {}", format_missing(.missing))]
    Denied {
        principal_id: String,
        missing: Vec<Permission>,
    },

    /// The route is restricted to administrators.
    #[error("admin access required for {principal_id}")]
    AdminRequired { principal_id: String },
}

fn format_missing(missing: &[Permission]) -> String {
    missing
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
