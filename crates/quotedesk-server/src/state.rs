//! Server state.

use crate::auth::TokenTable;
use quotedesk_core::config::StorageKind;
use quotedesk_core::{
    Bus, Config, ConfigError, CoreResult, LockManager, QuotationEditor, VersionStore,
};
use quotedesk_storage::{JsonStorage, MemoryExpiringStore, MemoryStorage, StorageBackend};
use std::sync::Arc;
use tracing::info;

/// Shared server state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    /// Lock and version operations.
    pub editor: QuotationEditor,
    /// Event bus carrying lock and version activity.
    pub bus: Bus,
    /// Accepted bearer tokens.
    pub tokens: Arc<TokenTable>,
}

impl AppState {
    pub fn new(editor: QuotationEditor, bus: Bus, tokens: TokenTable) -> Self {
        Self {
            editor,
            bus,
            tokens: Arc::new(tokens),
        }
    }

    /// Build state from configuration, connecting a fresh lock store.
    pub fn from_config(config: &Config) -> CoreResult<Self> {
        let storage: StorageBackend = match config.storage_kind() {
            StorageKind::Json => {
                let path = config.storage_path().ok_or_else(|| {
                    ConfigError::InvalidPath("Could not determine data directory".to_string())
                })?;
                JsonStorage::new(path).into()
            }
            StorageKind::Memory => MemoryStorage::new().into(),
        };
        info!(backend = storage.kind(), "Version storage ready");

        let bus = Bus::new();
        let locks = Arc::new(LockManager::connect(
            Arc::new(MemoryExpiringStore::new()),
            config.lock_ttl(),
            bus.clone(),
        ));
        let versions = Arc::new(VersionStore::new(Arc::new(storage), locks, bus.clone()));

        let tokens = TokenTable::new(config.principals());
        if tokens.is_empty() {
            tracing::warn!("No auth tokens configured; every API request will be rejected");
        }

        Ok(Self::new(QuotationEditor::new(versions), bus, tokens))
    }

    pub fn locks(&self) -> &Arc<LockManager> {
        self.editor.locks()
    }

    pub fn versions(&self) -> &Arc<VersionStore> {
        self.editor.versions()
    }

    /// Close the lock store. Call once the server has stopped accepting requests.
    pub async fn shutdown(&self) -> CoreResult<()> {
        self.locks().close().await
    }
}
