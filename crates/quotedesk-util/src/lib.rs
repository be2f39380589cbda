//! Shared utilities for quotedesk.
//!
//! This crate provides common utilities used across the quotedesk workspace:
//! - ULID-based identifier generation
//! - Logging setup with tracing

pub mod id;
pub mod log;

pub use id::{IdPrefix, Identifier};
pub use log::{LogConfig, LogLevel};
