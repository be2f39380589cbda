//! In-memory storage implementation for testing.

use crate::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing.
///
/// This stores all data in memory and is not persistent.
#[derive(Debug)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new in-memory storage.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(HashMap::new()),
        }
    }

    /// Convert a key slice to a storage key string.
    fn key_to_string(key: &[&str]) -> String {
        key.join("/")
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>> {
        let key_str = Self::key_to_string(key);
        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;

        match data.get(&key_str) {
            Some(json) => {
                let value: T = serde_json::from_str(json)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn insert<T: Serialize + Send + Sync>(
        &self,
        key: &[&str],
        value: &T,
    ) -> StorageResult<()> {
        if key.is_empty() {
            return Err(StorageError::invalid_key("Key cannot be empty"));
        }
        let json = serde_json::to_string(value)?;

        let mut data = self
            .data
            .write()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        match data.entry(Self::key_to_string(key)) {
            Entry::Occupied(_) => Err(StorageError::already_exists(key)),
            Entry::Vacant(slot) => {
                slot.insert(json);
                Ok(())
            }
        }
    }

    async fn list(&self, prefix: &[&str]) -> StorageResult<Vec<Vec<String>>> {
        let prefix_str = Self::key_to_string(prefix);
        let prefix_with_sep = if prefix_str.is_empty() {
            String::new()
        } else {
            format!("{prefix_str}/")
        };

        let data = self
            .data
            .read()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))?;
        let results: Vec<Vec<String>> = data
            .keys()
            .filter_map(|k| {
                let remainder = k.strip_prefix(&prefix_with_sep)?;

                // Only direct children (one level deep)
                if remainder.contains('/') {
                    return None;
                }

                Some(k.split('/').map(|s| s.to_string()).collect())
            })
            .collect();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
    struct Record {
        name: String,
        value: i32,
    }

    #[tokio::test]
    async fn test_memory_storage_insert_read() {
        let storage = MemoryStorage::new();

        let data = Record {
            name: "discount".to_string(),
            value: 10,
        };

        storage.insert(&["version", "q-1", "1"], &data).await.unwrap();

        let read: Option<Record> = storage.read(&["version", "q-1", "1"]).await.unwrap();
        assert_eq!(read, Some(data));
    }

    #[tokio::test]
    async fn test_memory_storage_insert_rejects_duplicate() {
        let storage = MemoryStorage::new();

        let first = Record {
            name: "first".to_string(),
            value: 1,
        };
        let second = Record {
            name: "second".to_string(),
            value: 2,
        };

        storage.insert(&["key"], &first).await.unwrap();
        let err = storage.insert(&["key"], &second).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(ref k) if k == "key"));

        let result: Option<Record> = storage.read(&["key"]).await.unwrap();
        assert_eq!(result.unwrap().name, "first");
    }

    #[tokio::test]
    async fn test_memory_storage_list() {
        let storage = MemoryStorage::new();
        let data = Record::default();

        storage.insert(&["quotation", "item1"], &data).await.unwrap();
        storage.insert(&["quotation", "item2"], &data).await.unwrap();
        storage.insert(&["other", "item"], &data).await.unwrap();

        let items = storage.list(&["quotation"]).await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_storage_list_empty_prefix() {
        let storage = MemoryStorage::new();

        let data = Record::default();
        storage.insert(&["item1"], &data).await.unwrap();
        storage.insert(&["item2"], &data).await.unwrap();

        // Empty prefix returns top-level items
        let items = storage.list(&[]).await.unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_storage_list_excludes_nested() {
        let storage = MemoryStorage::new();

        let data = Record::default();
        storage.insert(&["quotation", "item1"], &data).await.unwrap();
        storage
            .insert(&["quotation", "nested", "item"], &data)
            .await
            .unwrap();

        let items = storage.list(&["quotation"]).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0], vec!["quotation", "item1"]);
    }

    #[tokio::test]
    async fn test_memory_storage_read_nonexistent() {
        let storage = MemoryStorage::default();
        let result: Option<Record> = storage.read(&["does", "not", "exist"]).await.unwrap();
        assert!(result.is_none());
    }
}
