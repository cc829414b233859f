//! On-demand poll triggering.

use crate::handlers::rfc3339;
use crate::metrics::{API_REQUESTS, POLL_TRIGGERS};
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use scratcher_poller::{CycleSummary, TriggerOutcome};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub message: &'static str,
}

/// POST /api/poll - Start a cycle in the background.
///
/// Returns 202 immediately, or 409 if a cycle is already running. Never
/// waits for the cycle to finish.
pub async fn trigger_poll(State(state): State<AppState>) -> (StatusCode, Json<TriggerResponse>) {
    API_REQUESTS.with_label_values(&["poll"]).inc();

    match state.scheduler.trigger() {
        TriggerOutcome::Started => {
            POLL_TRIGGERS.with_label_values(&["started"]).inc();
            tracing::info!("On-demand poll cycle started");
            (
                StatusCode::ACCEPTED,
                Json(TriggerResponse {
                    success: true,
                    message: "Polling started",
                }),
            )
        }
        TriggerOutcome::AlreadyRunning => {
            POLL_TRIGGERS.with_label_values(&["rejected"]).inc();
            tracing::info!("On-demand poll rejected, cycle already running");
            (
                StatusCode::CONFLICT,
                Json(TriggerResponse {
                    success: false,
                    message: "A poll cycle is already running",
                }),
            )
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleSummaryResponse {
    pub started_at: String,
    pub finished_at: String,
    pub duration_ms: u64,
    pub sandboxes_seen: usize,
    pub sandboxes_polled: usize,
    pub sandboxes_degraded: usize,
    pub sandboxes_skipped: usize,
    pub sandboxes_failed: usize,
    pub changes_written: u64,
}

impl From<CycleSummary> for CycleSummaryResponse {
    fn from(summary: CycleSummary) -> Self {
        Self {
            started_at: rfc3339(summary.started_at),
            finished_at: rfc3339(summary.finished_at),
            duration_ms: summary.duration().as_millis() as u64,
            sandboxes_seen: summary.sandboxes_seen,
            sandboxes_polled: summary.sandboxes_polled,
            sandboxes_degraded: summary.sandboxes_degraded,
            sandboxes_skipped: summary.sandboxes_skipped,
            sandboxes_failed: summary.sandboxes_failed,
            changes_written: summary.changes_written,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollStatusResponse {
    pub success: bool,
    pub running: bool,
    pub last_cycle: Option<CycleSummaryResponse>,
}

/// GET /api/poll - Whether a cycle is running and the last completed summary.
pub async fn poll_status(State(state): State<AppState>) -> Json<PollStatusResponse> {
    API_REQUESTS.with_label_values(&["poll_status"]).inc();

    Json(PollStatusResponse {
        success: true,
        running: state.scheduler.is_running(),
        last_cycle: state.scheduler.last_summary().await.map(Into::into),
    })
}
