//! Mapping of core errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use quotedesk_core::{CoreError, LockError};
use quotedesk_storage::StorageError;
use serde_json::{json, Value};
use tracing::error;

/// An error response: status code plus a JSON body with `error` and `code`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: Value,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>, code: &str) -> Self {
        Self {
            status,
            body: json!({ "error": error.into(), "code": code }),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED")
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg, "NOT_FOUND")
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg, "BAD_REQUEST")
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg, "INTERNAL_ERROR")
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Lock(LockError::ResourceLocked {
                holder_id,
                acquired_at,
                ..
            }) => Self {
                status: StatusCode::LOCKED,
                body: json!({
                    "error": "Resource is locked by another user",
                    "code": "RESOURCE_LOCKED",
                    "locked_by": holder_id,
                    "locked_at": acquired_at,
                }),
            },
            CoreError::Lock(err @ LockError::NotHeld { .. }) => {
                Self::new(StatusCode::CONFLICT, err.to_string(), "LOCK_NOT_HELD")
            }
            CoreError::Permission(err) => {
                Self::new(StatusCode::FORBIDDEN, err.to_string(), "FORBIDDEN")
            }
            CoreError::Storage(StorageError::InvalidKey(msg)) => Self::bad_request(msg),
            CoreError::Storage(err @ StorageError::AlreadyExists(_)) => Self::new(
                StatusCode::CONFLICT,
                format!("Concurrent edit, retry: {err}"),
                "VERSION_CONFLICT",
            ),
            other => {
                error!(error = %other, "Request failed");
                Self::internal(other.to_string())
            }
        }
    }
}

impl From<quotedesk_core::PermissionError> for ApiError {
    fn from(err: quotedesk_core::PermissionError) -> Self {
        CoreError::from(err).into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
