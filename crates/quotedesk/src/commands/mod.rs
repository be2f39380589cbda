//! Command handlers for the quotedesk CLI.

pub mod config;
pub mod logging;
pub mod serve;

pub use config::*;
pub use logging::*;
pub use serve::*;
