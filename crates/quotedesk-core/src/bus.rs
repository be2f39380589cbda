//! Event bus for activity notifications.
//!
//! The lock manager and version store publish what they did; subscribers such
//! as the audit logger react without either side knowing about the other.
//! Events are typed, and every event is also delivered to wildcard
//! subscribers as JSON.
//!
//! # Example
//!
//! ```ignore
//! let bus = Bus::new();
//!
//! let mut rx = bus.subscribe::<VersionCreated>().await;
//! tokio::spawn(async move {
//!     while let Ok(event) = rx.recv().await {
//!         println!("{} v{}", event.quotation_id, event.version_number);
//!     }
//! });
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Trait for events that can be published on the bus.
pub trait Event: Clone + Send + Sync + 'static {
    /// Event type name for serialization/logging.
    fn event_type() -> &'static str;
}

/// The event bus for pub/sub communication.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    /// Typed channels by TypeId.
    channels: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    /// Wildcard subscribers (receive all events as JSON).
    wildcard: broadcast::Sender<BusEvent>,
}

/// A serialized event for wildcard subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    /// Event type name.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload as JSON.
    pub payload: serde_json::Value,
}

impl Bus {
    /// Create a new event bus.
    pub fn new() -> Self {
        let (wildcard, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                channels: RwLock::new(HashMap::new()),
                wildcard,
            }),
        }
    }

    /// Publish an event to all subscribers.
    pub async fn publish<E: Event + Serialize>(&self, event: E) {
        let type_id = TypeId::of::<E>();

        {
            let channels = self.inner.channels.read().await;
            if let Some(tx) = channels
                .get(&type_id)
                .and_then(|sender| sender.downcast_ref::<broadcast::Sender<E>>())
            {
                // No receivers is fine
                let _ = tx.send(event.clone());
            }
        }

        if let Ok(payload) = serde_json::to_value(&event) {
            let bus_event = BusEvent {
                event_type: E::event_type().to_string(),
                payload,
            };
            let _ = self.inner.wildcard.send(bus_event);
        }
    }

    /// Subscribe to events of type E.
    pub async fn subscribe<E: Event>(&self) -> broadcast::Receiver<E> {
        let type_id = TypeId::of::<E>();

        {
            let channels = self.inner.channels.read().await;
            if let Some(tx) = channels
                .get(&type_id)
                .and_then(|sender| sender.downcast_ref::<broadcast::Sender<E>>())
            {
                return tx.subscribe();
            }
        }

        // Another subscriber may have created the channel since the read
        let mut channels = self.inner.channels.write().await;
        if let Some(tx) = channels
            .get(&type_id)
            .and_then(|sender| sender.downcast_ref::<broadcast::Sender<E>>())
        {
            return tx.subscribe();
        }
        let (tx, rx) = broadcast::channel::<E>(DEFAULT_CAPACITY);
        channels.insert(type_id, Box::new(tx));
        rx
    }

    /// Subscribe to all events (wildcard).
    pub fn subscribe_all(&self) -> broadcast::Receiver<BusEvent> {
        self.inner.wildcard.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("wildcard_receivers", &self.inner.wildcard.receiver_count())
            .finish()
    }
}

// ============================================================================
// Activity Events
// ============================================================================

/// A principal took a lock that was free or expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockAcquired {
    pub resource_id: String,
    pub user_id: String,
    pub acquired_at: DateTime<Utc>,
}

impl Event for LockAcquired {
    fn event_type() -> &'static str {
        "lock.acquired"
    }
}

/// The holder re-acquired its own lock, re-arming the TTL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRefreshed {
    pub resource_id: String,
    pub user_id: String,
    pub acquired_at: DateTime<Utc>,
}

impl Event for LockRefreshed {
    fn event_type() -> &'static str {
        "lock.refreshed"
    }
}

/// A lock was removed before it expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockReleased {
    pub resource_id: String,
    /// Who removed the lock.
    pub user_id: String,
    /// The holder at the time of removal.
    pub holder_id: String,
    /// True when an administrator removed another principal's lock.
    pub forced: bool,
}

impl Event for LockReleased {
    fn event_type() -> &'static str {
        "lock.released"
    }
}

/// A version record was appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionCreated {
    pub quotation_id: String,
    pub user_id: String,
    pub version_id: String,
    pub version_number: u64,
}

impl Event for VersionCreated {
    fn event_type() -> &'static str {
        "version.created"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version_created(n: u64) -> VersionCreated {
        VersionCreated {
            quotation_id: "q-42".to_string(),
            user_id: "user1".to_string(),
            version_id: "ver_01".to_string(),
            version_number: n,
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = Bus::new();

        let mut rx = bus.subscribe::<VersionCreated>().await;
        bus.publish(version_created(1)).await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.quotation_id, "q-42");
        assert_eq!(event.version_number, 1);
    }

    #[tokio::test]
    async fn test_wildcard_subscribe() {
        let bus = Bus::new();

        let mut rx = bus.subscribe_all();
        bus.publish(LockReleased {
            resource_id: "q-42".to_string(),
            user_id: "admin".to_string(),
            holder_id: "user1".to_string(),
            forced: true,
        })
        .await;

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "lock.released");
        assert_eq!(event.payload["holder_id"], "user1");
        assert_eq!(event.payload["forced"], true);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = Bus::new();

        let mut rx1 = bus.subscribe::<VersionCreated>().await;
        let mut rx2 = bus.subscribe::<VersionCreated>().await;

        bus.publish(version_created(3)).await;

        assert_eq!(rx1.recv().await.unwrap().version_number, 3);
        assert_eq!(rx2.recv().await.unwrap().version_number, 3);
    }

    #[tokio::test]
    async fn test_typed_channels_are_separate() {
        let bus = Bus::new();

        let mut acquired = bus.subscribe::<LockAcquired>().await;
        bus.publish(version_created(1)).await;

        assert!(matches!(
            acquired.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = Bus::new();
        bus.publish(version_created(1)).await;
    }
}
