//! Advisory resource locks with a time-to-live.
//!
//! A lock gives one principal exclusive edit rights over a resource until it
//! releases the lock or the TTL runs out. All ownership decisions are made by
//! the backing [`ExpiringStore`] in a single atomic step, so two principals
//! racing for the same resource never both succeed.
//!
//! Successful acquisition returns a [`LockToken`]. Tokens can only be minted
//! here, and the version store demands one before it appends a record.

use crate::bus::{Bus, LockAcquired, LockRefreshed, LockReleased};
use crate::error::{CoreResult, LockError};
use chrono::{DateTime, Utc};
use quotedesk_storage::{Claim, ExpiringStore, Lease};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default lock time-to-live.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

/// Store key for a resource's lock.
fn lock_key(resource_id: &str) -> String {
    format!("lock:{resource_id}")
}

/// Value persisted alongside the owner in the expiring store.
#[derive(Debug, Serialize, Deserialize)]
struct LockRecord {
    holder_id: String,
    acquired_at: DateTime<Utc>,
}

impl LockRecord {
    fn decode(lease: &Lease) -> CoreResult<Self> {
        Ok(serde_json::from_str(&lease.value)?)
    }
}

/// Proof that a principal acquired the lock on a resource.
///
/// A token stays valid only while the lock it came from is live; use
/// [`LockManager::verify`] to check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LockToken {
    resource_id: String,
    holder_id: String,
    acquired_at: DateTime<Utc>,
}

impl LockToken {
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn holder_id(&self) -> &str {
        &self.holder_id
    }

    /// When the lock was first acquired. Refreshes keep this value.
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

/// Read-only view of a live lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    pub resource_id: String,
    pub holder_id: String,
    pub acquired_at: DateTime<Utc>,
    /// Whole seconds until the lock expires unless refreshed.
    pub expires_in_seconds: u64,
}

/// Grants and tracks resource locks.
pub struct LockManager {
    store: Arc<dyn ExpiringStore>,
    ttl: Duration,
    bus: Bus,
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl LockManager {
    /// Attach a lock manager to a store.
    ///
    /// The store may be shared with other managers; locks are coordinated
    /// through it alone.
    pub fn connect(store: Arc<dyn ExpiringStore>, ttl: Duration, bus: Bus) -> Self {
        info!(ttl_seconds = ttl.as_secs(), "Lock manager connected");
        Self { store, ttl, bus }
    }

    /// Lock time-to-live applied on every acquire.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Acquire or refresh the lock on `resource_id` for `principal_id`.
    ///
    /// Fails with [`LockError::ResourceLocked`] naming the current holder if
    /// another principal holds an unexpired lock.
    ///
    /// A refresh by the holder restarts the TTL but keeps the first
    /// `acquired_at`, so "locked since" reports when the edit began rather
    /// than the last renewal. Tokens issued before a refresh stay valid.
    pub async fn acquire(&self, resource_id: &str, principal_id: &str) -> CoreResult<LockToken> {
        let record = LockRecord {
            holder_id: principal_id.to_string(),
            acquired_at: Utc::now(),
        };
        let value = serde_json::to_string(&record)?;

        let claim = self
            .store
            .claim(&lock_key(resource_id), principal_id, value, self.ttl)
            .await?;
        let record = LockRecord::decode(claim.lease())?;

        match claim {
            Claim::Created(_) => {
                info!(resource = resource_id, user = principal_id, "Lock acquired");
                self.bus
                    .publish(LockAcquired {
                        resource_id: resource_id.to_string(),
                        user_id: principal_id.to_string(),
                        acquired_at: record.acquired_at,
                    })
                    .await;
            }
            Claim::Renewed(_) => {
                debug!(resource = resource_id, user = principal_id, "Lock refreshed");
                self.bus
                    .publish(LockRefreshed {
                        resource_id: resource_id.to_string(),
                        user_id: principal_id.to_string(),
                        acquired_at: record.acquired_at,
                    })
                    .await;
            }
            Claim::Held(lease) => {
                debug!(
                    resource = resource_id,
                    user = principal_id,
                    holder = %lease.owner,
                    "Lock contention"
                );
                return Err(LockError::ResourceLocked {
                    resource_id: resource_id.to_string(),
                    holder_id: lease.owner,
                    acquired_at: record.acquired_at,
                }
                .into());
            }
        }

        Ok(LockToken {
            resource_id: resource_id.to_string(),
            holder_id: principal_id.to_string(),
            acquired_at: record.acquired_at,
        })
    }

    /// Release the lock if `principal_id` holds it.
    ///
    /// Returns `false`, not an error, when there is no lock or someone else
    /// holds it.
    pub async fn release(&self, resource_id: &str, principal_id: &str) -> CoreResult<bool> {
        let released = self
            .store
            .release(&lock_key(resource_id), principal_id)
            .await?;

        if released {
            info!(resource = resource_id, user = principal_id, "Lock released");
            self.bus
                .publish(LockReleased {
                    resource_id: resource_id.to_string(),
                    user_id: principal_id.to_string(),
                    holder_id: principal_id.to_string(),
                    forced: false,
                })
                .await;
        }
        Ok(released)
    }

    /// Remove the lock on `resource_id` whoever holds it.
    ///
    /// Callers must check that `actor_id` is allowed to do this.
    pub async fn force_release(&self, resource_id: &str, actor_id: &str) -> CoreResult<bool> {
        let key = lock_key(resource_id);
        let Some(lease) = self.store.get(&key).await? else {
            return Ok(false);
        };

        // Compare-and-delete against the observed holder so a lock taken
        // after the read is left alone
        if !self.store.release(&key, &lease.owner).await? {
            return Ok(false);
        }

        warn!(
            resource = resource_id,
            user = actor_id,
            holder = %lease.owner,
            "Lock force-released"
        );
        self.bus
            .publish(LockReleased {
                resource_id: resource_id.to_string(),
                user_id: actor_id.to_string(),
                holder_id: lease.owner,
                forced: true,
            })
            .await;
        Ok(true)
    }

    /// Current lock on `resource_id`, or `None` if absent or expired.
    pub async fn get_lock_info(&self, resource_id: &str) -> CoreResult<Option<LockInfo>> {
        let Some(lease) = self.store.get(&lock_key(resource_id)).await? else {
            return Ok(None);
        };
        let record = LockRecord::decode(&lease)?;

        Ok(Some(LockInfo {
            resource_id: resource_id.to_string(),
            holder_id: lease.owner.clone(),
            acquired_at: record.acquired_at,
            expires_in_seconds: lease.remaining().as_secs(),
        }))
    }

    /// The token for a live lock `principal_id` holds on `resource_id`.
    pub async fn current_token(
        &self,
        resource_id: &str,
        principal_id: &str,
    ) -> CoreResult<Option<LockToken>> {
        let Some(lease) = self.store.get(&lock_key(resource_id)).await? else {
            return Ok(None);
        };
        if lease.owner != principal_id {
            return Ok(None);
        }
        let record = LockRecord::decode(&lease)?;

        Ok(Some(LockToken {
            resource_id: resource_id.to_string(),
            holder_id: principal_id.to_string(),
            acquired_at: record.acquired_at,
        }))
    }

    /// Confirm `token` still describes a live lock.
    ///
    /// A lock that expired, was released, or was re-acquired since the token
    /// was issued fails with [`LockError::NotHeld`].
    pub async fn verify(&self, token: &LockToken) -> CoreResult<()> {
        let not_held = || LockError::NotHeld {
            resource_id: token.resource_id.clone(),
            principal_id: token.holder_id.clone(),
        };

        let Some(lease) = self.store.get(&lock_key(&token.resource_id)).await? else {
            return Err(not_held().into());
        };
        if lease.owner != token.holder_id {
            return Err(not_held().into());
        }
        if LockRecord::decode(&lease)?.acquired_at != token.acquired_at {
            return Err(not_held().into());
        }
        Ok(())
    }

    /// Close the underlying store.
    pub async fn close(&self) -> CoreResult<()> {
        self.store.close().await?;
        info!("Lock manager closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use quotedesk_storage::MemoryExpiringStore;

    fn manager() -> LockManager {
        LockManager::connect(
            Arc::new(MemoryExpiringStore::new()),
            DEFAULT_LOCK_TTL,
            Bus::new(),
        )
    }

    fn assert_locked_by(err: CoreError, holder: &str) {
        match err {
            CoreError::Lock(LockError::ResourceLocked { holder_id, .. }) => {
                assert_eq!(holder_id, holder)
            }
            other => panic!("expected ResourceLocked, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_free_resource() {
        let locks = manager();

        let token = locks.acquire("q-1", "user1").await.unwrap();
        assert_eq!(token.resource_id(), "q-1");
        assert_eq!(token.holder_id(), "user1");

        let info = locks.get_lock_info("q-1").await.unwrap().unwrap();
        assert_eq!(info.holder_id, "user1");
        assert_eq!(info.acquired_at, token.acquired_at());
        assert_eq!(info.expires_in_seconds, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reacquire_refreshes_ttl_and_keeps_acquired_at() {
        let locks = manager();
        let first = locks.acquire("q-1", "user1").await.unwrap();

        tokio::time::advance(Duration::from_secs(250)).await;
        let second = locks.acquire("q-1", "user1").await.unwrap();
        assert_eq!(first, second);

        let info = locks.get_lock_info("q-1").await.unwrap().unwrap();
        assert_eq!(info.expires_in_seconds, 300);

        // Past the original expiry
        tokio::time::advance(Duration::from_secs(100)).await;
        assert!(locks.get_lock_info("q-1").await.unwrap().is_some());
        locks.verify(&first).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_held_resource_fails() {
        let locks = manager();
        let token = locks.acquire("q-1", "user1").await.unwrap();

        let err = locks.acquire("q-1", "user2").await.unwrap_err();
        match err {
            CoreError::Lock(LockError::ResourceLocked {
                resource_id,
                holder_id,
                acquired_at,
            }) => {
                assert_eq!(resource_id, "q-1");
                assert_eq!(holder_id, "user1");
                assert_eq!(acquired_at, token.acquired_at());
            }
            other => panic!("expected ResourceLocked, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_by_non_holder_keeps_lock() {
        let locks = manager();
        locks.acquire("q-1", "user1").await.unwrap();

        assert!(!locks.release("q-1", "user2").await.unwrap());
        let info = locks.get_lock_info("q-1").await.unwrap().unwrap();
        assert_eq!(info.holder_id, "user1");

        assert!(locks.release("q-1", "user1").await.unwrap());
        assert!(locks.get_lock_info("q-1").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_without_lock_returns_false() {
        let locks = manager();
        assert!(!locks.release("q-unknown", "user1").await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lock_is_absent_and_acquirable() {
        let locks = LockManager::connect(
            Arc::new(MemoryExpiringStore::new()),
            Duration::from_secs(1),
            Bus::new(),
        );
        let token = locks.acquire("q-1", "user1").await.unwrap();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(locks.get_lock_info("q-1").await.unwrap().is_none());
        assert!(locks.verify(&token).await.is_err());

        let token = locks.acquire("q-1", "user2").await.unwrap();
        assert_eq!(token.holder_id(), "user2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_rejects_token_from_earlier_lock() {
        let locks = manager();
        let stale = locks.acquire("q-1", "user1").await.unwrap();
        locks.release("q-1", "user1").await.unwrap();

        // Wall-clock timestamps must differ between the two acquisitions
        std::thread::sleep(Duration::from_millis(2));
        let fresh = locks.acquire("q-1", "user1").await.unwrap();

        locks.verify(&fresh).await.unwrap();
        let err = locks.verify(&stale).await.unwrap_err();
        assert!(matches!(err, CoreError::Lock(LockError::NotHeld { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_current_token_only_for_holder() {
        let locks = manager();
        let token = locks.acquire("q-1", "user1").await.unwrap();

        assert_eq!(
            locks.current_token("q-1", "user1").await.unwrap(),
            Some(token)
        );
        assert_eq!(locks.current_token("q-1", "user2").await.unwrap(), None);
        assert_eq!(locks.current_token("q-2", "user1").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_release() {
        let locks = manager();
        locks.acquire("q-1", "user1").await.unwrap();

        assert!(locks.force_release("q-1", "admin").await.unwrap());
        assert!(locks.get_lock_info("q-1").await.unwrap().is_none());
        assert!(!locks.force_release("q-1", "admin").await.unwrap());

        locks.acquire("q-1", "user2").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_locks_are_per_resource() {
        let locks = manager();
        locks.acquire("q-1", "user1").await.unwrap();
        locks.acquire("q-2", "user2").await.unwrap();

        assert_locked_by(locks.acquire("q-2", "user1").await.unwrap_err(), "user2");
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_published() {
        let bus = Bus::new();
        let locks = LockManager::connect(
            Arc::new(MemoryExpiringStore::new()),
            DEFAULT_LOCK_TTL,
            bus.clone(),
        );
        let mut acquired = bus.subscribe::<LockAcquired>().await;
        let mut refreshed = bus.subscribe::<LockRefreshed>().await;
        let mut released = bus.subscribe::<LockReleased>().await;

        locks.acquire("q-1", "user1").await.unwrap();
        locks.acquire("q-1", "user1").await.unwrap();
        let _ = locks.acquire("q-1", "user2").await;
        locks.release("q-1", "user1").await.unwrap();

        assert_eq!(acquired.recv().await.unwrap().user_id, "user1");
        assert_eq!(refreshed.recv().await.unwrap().user_id, "user1");
        let event = released.recv().await.unwrap();
        assert!(!event.forced);
        assert_eq!(event.holder_id, "user1");

        // Contention publishes nothing
        assert!(acquired.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_rejects_further_operations() {
        let locks = manager();
        locks.close().await.unwrap();

        let err = locks.acquire("q-1", "user1").await.unwrap_err();
        assert!(matches!(err, CoreError::Storage(_)));
    }
}
