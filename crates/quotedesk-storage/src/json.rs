//! JSON file-based storage implementation.
//!
//! This storage backend stores each key as a separate JSON file.
//! Keys are mapped to file paths: `["version", "q-42", "00000001"]` -> `version/q-42/00000001.json`

use crate::{Storage, StorageError, StorageResult};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::debug;

/// Distinguishes temp files of concurrent inserts within one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// JSON file-based storage.
#[derive(Debug, Clone)]
pub struct JsonStorage {
    base_path: PathBuf,
}

impl JsonStorage {
    /// Create a new JSON storage at the given base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// The directory all records live under.
    pub fn base_path(&self) -> &std::path::Path {
        &self.base_path
    }

    /// Get the file path for a key.
    fn key_to_path(&self, key: &[&str]) -> StorageResult<PathBuf> {
        if key.is_empty() {
            return Err(StorageError::invalid_key("Key cannot be empty"));
        }

        // No path traversal
        for component in key {
            if component.is_empty()
                || component.contains('/')
                || component.contains('\\')
                || *component == "."
                || *component == ".."
            {
                return Err(StorageError::invalid_key(format!(
                    "Invalid key component: {}",
                    component
                )));
            }
        }

        let (last, parents) = key
            .split_last()
            .ok_or_else(|| StorageError::invalid_key("Key cannot be empty"))?;
        let mut path = self.base_path.clone();
        for component in parents {
            path.push(component);
        }
        // Appended rather than set_extension so dotted ids keep their full name
        path.push(format!("{}.json", last));

        Ok(path)
    }

    /// Get the directory path for a prefix.
    fn prefix_to_dir(&self, prefix: &[&str]) -> PathBuf {
        let mut path = self.base_path.clone();
        for component in prefix {
            path.push(component);
        }
        path
    }
}

#[async_trait]
impl Storage for JsonStorage {
    async fn read<T: DeserializeOwned + Send>(&self, key: &[&str]) -> StorageResult<Option<T>> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "Reading from storage");

        match fs::read_to_string(&path).await {
            Ok(content) => {
                let value: T = serde_json::from_str(&content)?;
                Ok(Some(value))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn insert<T: Serialize + Send + Sync>(
        &self,
        key: &[&str],
        value: &T,
    ) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        debug!(path = %path.display(), "Inserting into storage");

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_json::to_string_pretty(value)?;

        // Write the full record to a temp file, then hard-link it into place.
        // Linking fails if the target exists, so readers never observe a
        // partial file and an existing record is never replaced.
        let seq = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp_path = path.with_extension(format!("json.{}.{}.tmp", std::process::id(), seq));
        fs::write(&temp_path, &content).await?;

        let linked = fs::hard_link(&temp_path, &path).await;
        let _ = fs::remove_file(&temp_path).await;

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::already_exists(key))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    async fn list(&self, prefix: &[&str]) -> StorageResult<Vec<Vec<String>>> {
        let dir = self.prefix_to_dir(prefix);
        debug!(path = %dir.display(), "Listing storage");

        let mut results = Vec::new();

        match fs::read_dir(&dir).await {
            Ok(mut entries) => {
                while let Some(entry) = entries.next_entry().await? {
                    let path = entry.path();

                    // Only include .json files (skips in-flight temp files)
                    if path.extension().is_some_and(|ext| ext == "json") {
                        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                            let mut key: Vec<String> =
                                prefix.iter().map(|s| s.to_string()).collect();
                            key.push(stem.to_string());
                            results.push(key);
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Directory doesn't exist, return empty list
            }
            Err(e) => return Err(StorageError::Io(e)),
        }

        Ok(results)
    }
}
