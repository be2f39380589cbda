//! Core business logic for quotedesk.
//!
//! This crate contains:
//! - Configuration loading and merging
//! - Role-based permissions
//! - Resource locks with a time-to-live
//! - Append-only quotation version history
//! - The lock/edit/record/release workflow
//! - JSON change diffs
//! - The event bus carrying activity events

pub mod bus;
pub mod config;
pub mod diff;
pub mod editor;
pub mod error;
pub mod lock;
pub mod permission;
pub mod version;

pub use bus::{Bus, BusEvent, Event};
pub use config::Config;
pub use editor::{EditSession, QuotationEditor};
pub use error::{ConfigError, CoreError, CoreResult, LockError, PermissionError};
pub use lock::{LockInfo, LockManager, LockToken, DEFAULT_LOCK_TTL};
pub use permission::{require, require_admin, Permission, Principal, Role};
pub use version::{VersionRecord, VersionStore};
