//! Bearer token authentication.
//!
//! Tokens are provisioned through configuration, each mapped to a
//! [`Principal`]. The middleware resolves the `Authorization` header to a
//! principal and stores it in the request extensions for handlers to pick up
//! with `Extension<Principal>`.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use quotedesk_core::Principal;
use subtle::ConstantTimeEq;
use tracing::warn;

/// Known tokens and the principals they authenticate.
#[derive(Debug, Default)]
pub struct TokenTable {
    entries: Vec<(String, Principal)>,
}

impl TokenTable {
    pub fn new(entries: impl IntoIterator<Item = (String, Principal)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a presented token.
    ///
    /// Every entry is compared, so timing does not depend on which entry
    /// matched.
    pub fn authenticate(&self, presented: &str) -> Option<Principal> {
        let mut found = None;
        for (token, principal) in &self.entries {
            if constant_time_eq(token.as_bytes(), presented.as_bytes()) {
                found = Some(principal);
            }
        }
        found.cloned()
    }
}

/// Constant-time comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

/// Extract the token from `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("authorization")?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Middleware rejecting requests without a known bearer token.
pub async fn require_bearer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(request.headers()) else {
        warn!(uri = %request.uri(), "Missing bearer token");
        return Err(ApiError::unauthorized("Missing bearer token"));
    };

    let Some(principal) = state.tokens.authenticate(token) else {
        warn!(uri = %request.uri(), "Invalid bearer token");
        return Err(ApiError::unauthorized("Invalid bearer token"));
    };

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use quotedesk_core::Role;

    fn table() -> TokenTable {
        TokenTable::new([
            ("alpha".to_string(), Principal::new("alice", Role::Admin)),
            ("bravo".to_string(), Principal::new("bob", Role::MedicalWriter)),
        ])
    }

    #[test]
    fn test_authenticate_known_token() {
        let tokens = table();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens.authenticate("bravo").unwrap().id, "bob");
    }

    #[test]
    fn test_authenticate_rejects_unknown_and_prefixes() {
        let tokens = table();
        assert!(tokens.authenticate("charlie").is_none());
        assert!(tokens.authenticate("alph").is_none());
        assert!(tokens.authenticate("alphaa").is_none());
        assert!(tokens.authenticate("").is_none());
    }

    #[test]
    fn test_empty_table_rejects_everything() {
        let tokens = TokenTable::default();
        assert!(tokens.is_empty());
        assert!(tokens.authenticate("anything").is_none());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer  abc "));
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
