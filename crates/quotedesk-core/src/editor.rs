//! Lock, edit, record, release.
//!
//! [`QuotationEditor`] ties the lock manager and version store together so an
//! edit always runs under the quotation's lock:
//!
//! ```ignore
//! let session = editor.begin("q-42", "user1").await?;
//! session.record_diff(&before, &after).await?;
//! session.finish().await?;
//! ```

use crate::diff;
use crate::error::CoreResult;
use crate::lock::{LockManager, LockToken};
use crate::version::{VersionRecord, VersionStore};
use quotedesk_storage::{Storage, StorageBackend};
use serde_json::Value;
use std::sync::Arc;

/// Entry point for edits to quotations.
#[derive(Debug)]
pub struct QuotationEditor<S = StorageBackend> {
    versions: Arc<VersionStore<S>>,
}

impl<S> Clone for QuotationEditor<S> {
    fn clone(&self) -> Self {
        Self {
            versions: self.versions.clone(),
        }
    }
}

impl<S: Storage> QuotationEditor<S> {
    pub fn new(versions: Arc<VersionStore<S>>) -> Self {
        Self { versions }
    }

    pub fn versions(&self) -> &Arc<VersionStore<S>> {
        &self.versions
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        self.versions.locks()
    }

    /// Lock `quotation_id` for `principal_id` and open an edit session.
    ///
    /// Fails with the lock manager's `ResourceLocked` error when another
    /// principal is editing.
    pub async fn begin(&self, quotation_id: &str, principal_id: &str) -> CoreResult<EditSession<S>> {
        let token = self.locks().acquire(quotation_id, principal_id).await?;
        Ok(EditSession {
            versions: self.versions.clone(),
            token,
        })
    }
}

/// An open edit on one quotation, holding its lock.
///
/// Dropping a session without calling [`finish`](Self::finish) leaves the
/// lock to expire on its own.
#[derive(Debug)]
pub struct EditSession<S = StorageBackend> {
    versions: Arc<VersionStore<S>>,
    token: LockToken,
}

impl<S: Storage> EditSession<S> {
    pub fn quotation_id(&self) -> &str {
        self.token.resource_id()
    }

    pub fn principal_id(&self) -> &str {
        self.token.holder_id()
    }

    pub fn token(&self) -> &LockToken {
        &self.token
    }

    /// Refresh the lock's TTL.
    pub async fn keep_alive(&mut self) -> CoreResult<()> {
        self.token = self
            .versions
            .locks()
            .acquire(self.token.resource_id(), self.token.holder_id())
            .await?;
        Ok(())
    }

    /// Append a version with the given change payload.
    pub async fn record(&self, changes: Value) -> CoreResult<VersionRecord> {
        self.versions
            .create_version(
                self.token.resource_id(),
                changes,
                self.token.holder_id(),
                &self.token,
            )
            .await
    }

    /// Append a version describing the fields that differ between `before`
    /// and `after`. Returns `None` and writes nothing when they are equal.
    pub async fn record_diff(
        &self,
        before: &Value,
        after: &Value,
    ) -> CoreResult<Option<VersionRecord>> {
        let changes = diff::changes(before, after);
        if changes.is_empty() {
            return Ok(None);
        }
        self.record(Value::Object(changes)).await.map(Some)
    }

    /// Release the lock. Returns `false` if it had already expired or been
    /// taken away.
    pub async fn finish(self) -> CoreResult<bool> {
        self.versions
            .locks()
            .release(self.token.resource_id(), self.token.holder_id())
            .await
    }
}
