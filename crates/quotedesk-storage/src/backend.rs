//! Runtime-selected storage backend.

use crate::{JsonStorage, MemoryStorage, Storage, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

/// A [`Storage`] implementation chosen at startup.
///
/// [`Storage`] has generic methods and cannot be used as a trait object, so
/// callers that pick the backend from configuration hold this enum instead.
#[derive(Debug)]
pub enum StorageBackend {
    /// JSON files under a base directory.
    Json(JsonStorage),
    /// Process memory; lost on exit.
    Memory(MemoryStorage),
}

impl StorageBackend {
    /// Short name of the backend, as used in configuration.
    pub fn kind(&self) -> &'static str {
        match self {
            StorageBackend::Json(_) => "json",
            StorageBackend::Memory(_) => "memory",
        }
    }
}

impl From<JsonStorage> for StorageBackend {
    fn from(storage: JsonStorage) -> Self {
        StorageBackend::Json(storage)
    }
}

impl From<MemoryStorage> for StorageBackend {
    fn from(storage: MemoryStorage) -> Self {
        StorageBackend::Memory(storage)
    }
}

#[async_trait]
impl Storage for StorageBackend {
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>> {
        match self {
            StorageBackend::Json(s) => s.read(key).await,
            StorageBackend::Memory(s) => s.read(key).await,
        }
    }

    async fn insert<T: Serialize + Send + Sync>(
        &self,
        key: &[&str],
        value: &T,
    ) -> StorageResult<()> {
        match self {
            StorageBackend::Json(s) => s.insert(key, value).await,
            StorageBackend::Memory(s) => s.insert(key, value).await,
        }
    }

    async fn list(&self, prefix: &[&str]) -> StorageResult<Vec<Vec<String>>> {
        match self {
            StorageBackend::Json(s) => s.list(prefix).await,
            StorageBackend::Memory(s) => s.list(prefix).await,
        }
    }
}
