//! API key authentication middleware.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};

/// Header carrying the shared read API key.
pub const API_KEY_HEADER: &str = "x-api-key";

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Compare a presented key against the configured one.
///
/// Both sides are hashed first so the comparison runs over fixed-length
/// input regardless of what the caller sent.
pub fn keys_match(presented: &str, expected: &str) -> bool {
    let presented = digest(presented);
    let expected = digest(expected);
    presented
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Reject requests without a valid `X-API-Key` header. With no key
/// configured every request is rejected.
pub async fn api_key_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.config.server.api_key.as_deref() else {
        tracing::warn!(path = %req.uri().path(), "Rejected request, no server.api_key configured");
        return Err(ApiError::Unauthorized);
    };

    let presented = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    match presented {
        Some(key) if keys_match(key, expected) => Ok(next.run(req).await),
        _ => {
            tracing::warn!(path = %req.uri().path(), "Rejected request with missing or invalid API key");
            Err(ApiError::Unauthorized)
        }
    }
}
