//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid key format
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Insert targeted a key that already holds a value
    #[error("Key already exists: {0}")]
    AlreadyExists(String),

    /// Lock was poisoned (another thread panicked while holding the lock)
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// The store was closed and no longer accepts operations
    #[error("Store is closed")]
    Closed,
}

impl StorageError {
    /// Create an already-exists error for the given key.
    pub fn already_exists(key: &[&str]) -> Self {
        Self::AlreadyExists(key.join("/"))
    }

    /// Create an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_error_invalid_key_formats_message() {
        let err = StorageError::invalid_key("empty key component");
        assert_eq!(err.to_string(), "Invalid key: empty key component");
    }

    #[test]
    fn storage_error_io_wraps_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = StorageError::from(io_err);
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn storage_error_json_wraps_serde_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err = StorageError::from(json_err);
        assert!(err.to_string().contains("JSON error"));
    }

    #[test]
    fn storage_error_already_exists_formats_key() {
        let err = StorageError::already_exists(&["version", "q-42", "00000001"]);
        assert_eq!(err.to_string(), "Key already exists: version/q-42/00000001");
    }

    #[test]
    fn storage_error_closed_displays() {
        assert_eq!(StorageError::Closed.to_string(), "Store is closed");
    }

    #[test]
    fn storage_error_lock_poisoned_displays() {
        let err = StorageError::LockPoisoned("mutex poisoned".to_string());
        assert_eq!(err.to_string(), "Lock poisoned: mutex poisoned");
    }
}
