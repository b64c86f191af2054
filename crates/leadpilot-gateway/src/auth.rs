//! Optional bearer-token guard for `/api/*`

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use crate::error::ApiError;
use crate::server::GatewayState;

/// Validate a bearer token against the configured API token.
///
/// An empty configured token disables auth.
pub fn validate_token(configured_token: &str, provided_token: &str) -> bool {
    if configured_token.is_empty() {
        return true;
    }
    if provided_token.is_empty() {
        return false;
    }
    constant_time_eq(configured_token.as_bytes(), provided_token.as_bytes())
}

/// Token from an `Authorization: Bearer <token>` header value
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .trim()
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub fn check_auth(configured_token: &str, headers: &HeaderMap) -> bool {
    if configured_token.is_empty() {
        return true;
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(extract_bearer_token)
        .is_some_and(|t| validate_token(configured_token, t))
}

/// Middleware rejecting unauthenticated requests with 401
pub async fn require_token(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Response {
    if !check_auth(&state.auth_token, request.headers()) {
        warn!("Rejected unauthenticated {} {}", request.method(), request.uri().path());
        return ApiError::Unauthorized.into_response();
    }
    next.run(request).await
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", value.parse().unwrap());
        headers
    }

    #[test]
    fn test_validate_token() {
        assert!(validate_token("", "anything"));
        assert!(validate_token("s3cret", "s3cret"));
        assert!(!validate_token("s3cret", "wrong"));
        assert!(!validate_token("s3cret", ""));
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Bearer  spaced "), Some("spaced"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc123"), None);
    }

    #[test]
    fn test_check_auth() {
        assert!(check_auth("", &HeaderMap::new()));
        assert!(check_auth("s3cret", &headers("Bearer s3cret")));
        assert!(!check_auth("s3cret", &headers("Bearer nope")));
        assert!(!check_auth("s3cret", &HeaderMap::new()));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"lead", b"lead"));
        assert!(!constant_time_eq(b"lead", b"leap"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
