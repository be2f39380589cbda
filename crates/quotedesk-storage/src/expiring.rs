//! Keyed storage with time-to-live and atomic ownership operations.
//!
//! An [`ExpiringStore`] holds short-lived leases: a key, the owner that
//! claimed it, an opaque value, and an expiry instant. Expiry is passive.
//! A lease whose expiry has passed is treated as absent by every operation,
//! with no background sweep involved.

use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::time::{Duration, Instant};
use tracing::debug;

/// A live entry in an expiring store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    /// Owner that claimed the key.
    pub owner: String,
    /// Opaque value stored alongside the owner.
    pub value: String,
    /// Instant after which the lease no longer exists.
    pub expires_at: Instant,
}

impl Lease {
    /// Whether the lease has expired as of `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    /// Time left before expiry.
    pub fn remaining(&self) -> Duration {
        self.expires_at.saturating_duration_since(Instant::now())
    }
}

/// Outcome of [`ExpiringStore::claim`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// No live lease existed; a new one was stored.
    Created(Lease),
    /// The caller already owned the lease; its expiry was re-armed and the
    /// stored value kept.
    Renewed(Lease),
    /// Another owner holds a live lease, returned as observed.
    Held(Lease),
}

impl Claim {
    /// Whether the caller owns the lease after this claim.
    pub fn is_owned(&self) -> bool {
        !matches!(self, Claim::Held(_))
    }

    /// The lease as observed by the claim.
    pub fn lease(&self) -> &Lease {
        match self {
            Claim::Created(lease) | Claim::Renewed(lease) | Claim::Held(lease) => lease,
        }
    }
}

/// Keyed storage whose entries expire on their own.
///
/// Every method is a single atomic interaction with the store. In particular
/// `claim` checks ownership and writes in one step, so concurrent claims on a
/// key never both observe it as free.
#[async_trait]
pub trait ExpiringStore: Send + Sync {
    /// Read the live lease for a key.
    async fn get(&self, key: &str) -> StorageResult<Option<Lease>>;

    /// Set the key if it is absent (or expired) or already owned by `owner`.
    ///
    /// A new lease stores `value` and expires after `ttl`. A lease already
    /// owned by `owner` keeps its value and has its expiry moved to
    /// `now + ttl`. A lease owned by someone else is left untouched and
    /// returned as [`Claim::Held`].
    async fn claim(
        &self,
        key: &str,
        owner: &str,
        value: String,
        ttl: Duration,
    ) -> StorageResult<Claim>;

    /// Delete the key if its live lease is owned by `owner`.
    ///
    /// Returns whether a lease was removed.
    async fn release(&self, key: &str, owner: &str) -> StorageResult<bool>;

    /// Close the store. Later operations fail with [`StorageError::Closed`].
    async fn close(&self) -> StorageResult<()>;
}

/// In-process expiring store.
///
/// All state sits behind one mutex that is never held across an await, so
/// every operation is atomic with respect to every other.
#[derive(Debug, Default)]
pub struct MemoryExpiringStore {
    leases: Mutex<HashMap<String, Lease>>,
    closed: AtomicBool,
}

impl MemoryExpiringStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn leases(&self) -> StorageResult<MutexGuard<'_, HashMap<String, Lease>>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        self.leases
            .lock()
            .map_err(|e| StorageError::LockPoisoned(e.to_string()))
    }

    /// Remove `key` if its lease has expired, returning the live lease otherwise.
    fn live<'a>(
        leases: &'a mut HashMap<String, Lease>,
        key: &str,
        now: Instant,
    ) -> Option<&'a mut Lease> {
        if leases.get(key).is_some_and(|lease| lease.is_expired_at(now)) {
            debug!(key, "Dropping expired lease");
            leases.remove(key);
        }
        leases.get_mut(key)
    }
}

#[async_trait]
impl ExpiringStore for MemoryExpiringStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Lease>> {
        let mut leases = self.leases()?;
        Ok(Self::live(&mut leases, key, Instant::now()).map(|lease| lease.clone()))
    }

    async fn claim(
        &self,
        key: &str,
        owner: &str,
        value: String,
        ttl: Duration,
    ) -> StorageResult<Claim> {
        let now = Instant::now();
        let mut leases = self.leases()?;

        if let Some(lease) = Self::live(&mut leases, key, now) {
            if lease.owner == owner {
                lease.expires_at = now + ttl;
                return Ok(Claim::Renewed(lease.clone()));
            }
            return Ok(Claim::Held(lease.clone()));
        }

        let lease = Lease {
            owner: owner.to_string(),
            value,
            expires_at: now + ttl,
        };
        leases.insert(key.to_string(), lease.clone());
        Ok(Claim::Created(lease))
    }

    async fn release(&self, key: &str, owner: &str) -> StorageResult<bool> {
        let mut leases = self.leases()?;
        match Self::live(&mut leases, key, Instant::now()) {
            Some(lease) if lease.owner == owner => {
                leases.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn close(&self) -> StorageResult<()> {
        let mut leases = self.leases()?;
        leases.clear();
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
