//! Liveness and readiness probes.

use crate::error::{ApiError, ApiResult};
use crate::handlers::rfc3339;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use serde::Serialize;
use time::OffsetDateTime;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: &'static str,
}

impl HealthResponse {
    fn healthy() -> Self {
        Self {
            status: "healthy",
            timestamp: rfc3339(OffsetDateTime::now_utc()),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// GET /health - Liveness probe.
///
/// Answers as long as the process is serving; does not touch the store.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// GET /ready - Readiness probe. 503 while the change store is unreachable.
pub async fn readiness_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state
        .metadata
        .health_check()
        .await
        .map_err(|e| ApiError::Unavailable(format!("change store: {e}")))?;

    Ok(Json(HealthResponse::healthy()))
}
