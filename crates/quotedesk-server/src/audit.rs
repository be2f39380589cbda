//! Activity audit log.
//!
//! Subscribes to every bus event and writes it as a structured `info!` record
//! with `user_id`, `action`, `resource` and `details` fields.

use quotedesk_core::{Bus, BusEvent};
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// One line of the audit log.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub user_id: String,
    pub action: String,
    pub resource: String,
    pub details: Value,
}

impl ActivityRecord {
    /// Derive an activity record from a bus event.
    ///
    /// Events name their subject either `resource_id` or `quotation_id`.
    pub fn from_event(event: &BusEvent) -> Self {
        let field = |name: &str| event.payload.get(name).and_then(Value::as_str);

        Self {
            user_id: field("user_id").unwrap_or("unknown").to_string(),
            action: event.event_type.clone(),
            resource: field("resource_id")
                .or_else(|| field("quotation_id"))
                .unwrap_or("")
                .to_string(),
            details: event.payload.clone(),
        }
    }

    fn log(&self) {
        info!(
            target: "quotedesk::audit",
            user_id = %self.user_id,
            action = %self.action,
            resource = %self.resource,
            details = %self.details,
            "Activity"
        );
    }
}

/// Spawn the audit logger.
///
/// It runs until every handle to the bus is dropped, logs whatever was still
/// queued, and resolves to the number of records written.
pub fn spawn_audit_logger(bus: &Bus) -> JoinHandle<u64> {
    let mut rx = bus.subscribe_all();
    tokio::spawn(async move {
        let mut written = 0;
        loop {
            match rx.recv().await {
                Ok(event) => {
                    ActivityRecord::from_event(&event).log();
                    written += 1;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Audit logger lagged; activity records dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
        written
    })
}
