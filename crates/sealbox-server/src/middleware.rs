//! HTTP middleware for authentication, rate limiting, and request ids

use crate::error::{ApiError, ErrorKind};
use crate::state::{AppState, SessionContext};
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use governor::{Quota, RateLimiter, state::keyed::DefaultKeyedStateStore};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type
pub type KeyedRateLimiter =
    RateLimiter<String, DefaultKeyedStateStore<String>, governor::clock::DefaultClock>;

/// Create a rate limiter
pub fn create_rate_limiter(requests_per_second: u32) -> Arc<KeyedRateLimiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second.max(1)).expect("nonzero"));
    Arc::new(RateLimiter::keyed(quota))
}

/// Extract bearer token from an Authorization header value
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
}

/// Authentication middleware for the protected router
///
/// Resolves the bearer token to a durable session row and stores the
/// caller as a request extension. Missing, unknown, and expired tokens
/// are all 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let token = auth_header
        .and_then(extract_bearer_token)
        .ok_or_else(|| ApiError::new(ErrorKind::Unauthorized, "bearer token required"))?
        .to_string();

    let snapshot = state.registry.session(&token)?;

    request.extensions_mut().insert(SessionContext {
        token,
        researcher_id: snapshot.researcher_id,
    });

    Ok(next.run(request).await)
}

/// Rate limiting middleware, keyed per caller
///
/// Runs outside the auth layer, so it keys on the presented bearer
/// token rather than the resolved identity; unauthenticated requests
/// share one bucket.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<KeyedRateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let key = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(extract_bearer_token)
        .unwrap_or("anonymous")
        .to_string();

    if limiter.check_key(&key).is_err() {
        return Err(ApiError::new(
            ErrorKind::RateLimited,
            "please reduce your request rate",
        ));
    }

    Ok(next.run(request).await)
}

/// Request ID middleware - adds an x-request-id header
pub async fn request_id_middleware(mut request: Request<Body>, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// Request ID extension
#[derive(Clone)]
pub struct RequestId(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Basic xyz"), None);
        assert_eq!(extract_bearer_token(""), None);
    }
}
