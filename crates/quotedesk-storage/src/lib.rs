//! Storage layer for quotedesk.
//!
//! This crate provides two storage abstractions:
//! - [`Storage`]: durable, append-only records keyed by path segments, with a
//!   JSON file backend and an in-memory backend, selectable at runtime
//!   through [`StorageBackend`].
//! - [`ExpiringStore`]: short-lived keys with a time-to-live and atomic
//!   claim/release, used for advisory locks.

pub mod backend;
pub mod error;
pub mod expiring;
pub mod json;
pub mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use expiring::{Claim, ExpiringStore, Lease, MemoryExpiringStore};
pub use json::JsonStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A trait for durable record storage backends.
///
/// Keys are represented as path segments, e.g. `["version", "q-42", "00000001"]`.
/// Values are serialized/deserialized as JSON. Records are insert-only: an
/// existing key is never overwritten.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read a value from storage.
    ///
    /// Returns `None` if the key doesn't exist.
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>>;

    /// Insert a new value.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if the key already holds a
    /// value; the existing value is left untouched.
    async fn insert<T: Serialize + Send + Sync>(&self, key: &[&str], value: &T)
        -> StorageResult<()>;

    /// List all keys directly under a prefix.
    ///
    /// Returns the full key paths for each item, in no particular order.
    async fn list(&self, prefix: &[&str]) -> StorageResult<Vec<Vec<String>>>;
}
