//! HTTP routes for the server.
//!
//! Everything under `/api` requires a bearer token. Each handler checks the
//! caller's permissions before touching locks or versions.

use crate::{auth, error::ApiError, state::AppState};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Extension, Router,
};
use quotedesk_core::{
    require, require_admin, CoreError, LockError, LockInfo, Permission, Principal, VersionRecord,
};
use quotedesk_util::Identifier;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "request",
            request_id = %Identifier::request(),
            method = %request.method(),
            uri = %request.uri(),
        )
    });

    let api = Router::new()
        // ===================
        // Lock endpoints
        // ===================
        .route("/quotations/{id}/lock", post(lock_acquire))
        .route("/quotations/{id}/lock", delete(lock_release))
        .route("/quotations/{id}/lock", get(lock_get))
        .route("/quotations/{id}/lock/force", delete(lock_force_release))
        // ===================
        // Version endpoints
        // ===================
        .route("/quotations/{id}/versions", post(version_create))
        .route("/quotations/{id}/versions", get(version_history))
        .route("/quotations/{id}/versions/latest", get(version_latest))
        .route("/quotations/{id}/versions/{number}", get(version_get))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .with_state(state)
        .layer(trace)
        .layer(cors)
}

// =============================================================================
// Request/response types
// =============================================================================

#[derive(Debug, Serialize)]
struct ReleaseResponse {
    released: bool,
}

#[derive(Debug, Deserialize)]
struct CreateVersionRequest {
    changes: serde_json::Value,
}

type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// Global endpoints
// =============================================================================

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "healthy": true,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

// =============================================================================
// Lock endpoints
// =============================================================================

/// Acquire or refresh the caller's lock.
async fn lock_acquire(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<LockInfo>> {
    require(&principal, &[Permission::EditQuotation])?;

    let token = state.locks().acquire(&id, &principal.id).await?;
    Ok(Json(LockInfo {
        resource_id: token.resource_id().to_string(),
        holder_id: token.holder_id().to_string(),
        acquired_at: token.acquired_at(),
        expires_in_seconds: state.locks().ttl().as_secs(),
    }))
}

/// Release the caller's lock.
async fn lock_release(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReleaseResponse>> {
    require(&principal, &[Permission::EditQuotation])?;

    let released = state.locks().release(&id, &principal.id).await?;
    Ok(Json(ReleaseResponse { released }))
}

/// Current lock, or `null`.
async fn lock_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Option<LockInfo>>> {
    require(&principal, &[Permission::ViewQuotation])?;

    Ok(Json(state.locks().get_lock_info(&id).await?))
}

/// Remove someone else's lock.
async fn lock_force_release(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReleaseResponse>> {
    require_admin(&principal)?;

    let released = state.locks().force_release(&id, &principal.id).await?;
    Ok(Json(ReleaseResponse { released }))
}

// =============================================================================
// Version endpoints
// =============================================================================

/// Append a version under the caller's live lock.
async fn version_create(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(body): Json<CreateVersionRequest>,
) -> ApiResult<(StatusCode, Json<VersionRecord>)> {
    require(&principal, &[Permission::EditQuotation])?;

    let Some(token) = state.locks().current_token(&id, &principal.id).await? else {
        return Err(CoreError::from(LockError::NotHeld {
            resource_id: id,
            principal_id: principal.id,
        })
        .into());
    };

    let record = state
        .versions()
        .create_version(&id, body.changes, &principal.id, &token)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// All versions, newest first.
async fn version_history(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<VersionRecord>>> {
    require(&principal, &[Permission::ViewQuotation])?;

    Ok(Json(state.versions().get_version_history(&id).await?))
}

/// Newest version.
async fn version_latest(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult<Json<VersionRecord>> {
    require(&principal, &[Permission::ViewQuotation])?;

    state
        .versions()
        .get_latest_version(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No versions for quotation: {id}")))
}

/// One version by number.
async fn version_get(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path((id, number)): Path<(String, u64)>,
) -> ApiResult<Json<VersionRecord>> {
    require(&principal, &[Permission::ViewQuotation])?;

    state
        .versions()
        .get_version(&id, number)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Version {number} not found: {id}")))
}
