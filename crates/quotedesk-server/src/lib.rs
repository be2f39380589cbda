//! HTTP server for quotedesk.
//!
//! Exposes quotation locks and version history as a REST API.

pub mod audit;
pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use audit::spawn_audit_logger;
pub use auth::TokenTable;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
