//! Append-only version history for quotations.
//!
//! Each edit to a quotation appends a [`VersionRecord`] holding the change
//! payload. Numbers start at 1 and increase by one per record; records are
//! never updated or removed.
//!
//! Records live under `version/<quotation>/<number>` with the number
//! zero-padded, so keys sort in version order.

use crate::bus::{Bus, VersionCreated};
use crate::error::{CoreResult, LockError};
use crate::lock::{LockManager, LockToken};
use chrono::{DateTime, Utc};
use quotedesk_storage::{Storage, StorageBackend};
use quotedesk_util::Identifier;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const VERSION_PREFIX: &str = "version";

fn version_key(number: u64) -> String {
    format!("{number:08}")
}

/// One immutable entry in a quotation's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: String,
    #[serde(rename = "quotation_id")]
    pub subject_id: String,
    pub version_number: u64,
    /// Change payload, stored and returned as given.
    pub changes: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// Appends and queries version records.
///
/// Appends are serialized by the resource lock, not by the store: callers
/// pass the [`LockToken`] for the quotation, and it is verified against the
/// lock manager before anything is written.
pub struct VersionStore<S = StorageBackend> {
    storage: Arc<S>,
    locks: Arc<LockManager>,
    bus: Bus,
}

impl<S> std::fmt::Debug for VersionStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore").finish_non_exhaustive()
    }
}

impl<S: Storage> VersionStore<S> {
    pub fn new(storage: Arc<S>, locks: Arc<LockManager>, bus: Bus) -> Self {
        Self {
            storage,
            locks,
            bus,
        }
    }

    /// The lock manager appends are checked against.
    pub fn locks(&self) -> &Arc<LockManager> {
        &self.locks
    }

    /// Append the next version for `subject_id`.
    ///
    /// `token` must name `subject_id` and `principal_id` and the lock must
    /// still be live, otherwise [`LockError::NotHeld`] is returned and nothing
    /// is written.
    ///
    /// The lock keeps other principals out but does not order appends made
    /// concurrently under the same token. Those may pick the same number;
    /// one wins and the rest fail with `StorageError::AlreadyExists`. Nothing
    /// is overwritten and numbering stays contiguous, so the caller can
    /// simply retry.
    pub async fn create_version(
        &self,
        subject_id: &str,
        changes: serde_json::Value,
        principal_id: &str,
        token: &LockToken,
    ) -> CoreResult<VersionRecord> {
        if token.resource_id() != subject_id || token.holder_id() != principal_id {
            return Err(LockError::NotHeld {
                resource_id: subject_id.to_string(),
                principal_id: principal_id.to_string(),
            }
            .into());
        }
        self.locks.verify(token).await?;

        let number = self.highest_version(subject_id).await? + 1;
        let record = VersionRecord {
            id: Identifier::version(),
            subject_id: subject_id.to_string(),
            version_number: number,
            changes,
            created_at: Utc::now(),
            created_by: principal_id.to_string(),
        };

        self.storage
            .insert(&[VERSION_PREFIX, subject_id, &version_key(number)], &record)
            .await?;

        info!(
            quotation = subject_id,
            version = number,
            user = principal_id,
            "Version created"
        );
        self.bus
            .publish(VersionCreated {
                quotation_id: subject_id.to_string(),
                user_id: principal_id.to_string(),
                version_id: record.id.clone(),
                version_number: number,
            })
            .await;

        Ok(record)
    }

    /// All versions of `subject_id`, newest first.
    pub async fn get_version_history(&self, subject_id: &str) -> CoreResult<Vec<VersionRecord>> {
        let mut numbers = self.version_numbers(subject_id).await?;
        numbers.sort_unstable_by(|a, b| b.cmp(a));

        let mut history = Vec::with_capacity(numbers.len());
        for number in numbers {
            if let Some(record) = self.get_version(subject_id, number).await? {
                history.push(record);
            }
        }
        Ok(history)
    }

    /// The newest version of `subject_id`, if any.
    pub async fn get_latest_version(&self, subject_id: &str) -> CoreResult<Option<VersionRecord>> {
        match self.highest_version(subject_id).await? {
            0 => Ok(None),
            number => self.get_version(subject_id, number).await,
        }
    }

    /// A specific version of `subject_id`, if it exists.
    pub async fn get_version(
        &self,
        subject_id: &str,
        version_number: u64,
    ) -> CoreResult<Option<VersionRecord>> {
        Ok(self
            .storage
            .read(&[VERSION_PREFIX, subject_id, &version_key(version_number)])
            .await?)
    }

    async fn version_numbers(&self, subject_id: &str) -> CoreResult<Vec<u64>> {
        let keys = self.storage.list(&[VERSION_PREFIX, subject_id]).await?;
        Ok(keys
            .iter()
            .filter_map(|key| key.last()?.parse().ok())
            .collect())
    }

    /// Highest stored version number, 0 when there are none.
    async fn highest_version(&self, subject_id: &str) -> CoreResult<u64> {
        Ok(self
            .version_numbers(subject_id)
            .await?
            .into_iter()
            .max()
            .unwrap_or(0))
    }
}
