//! Prometheus metrics for the read API.
//!
//! Server metrics share the poll engine's registry so a single `/metrics`
//! scrape covers both.
//!
//! The endpoint is unauthenticated. Restrict it at the network level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounterVec, Opts, TextEncoder};
use scratcher_poller::metrics::REGISTRY;
use std::sync::{LazyLock, Once};

pub static API_REQUESTS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scratcher_api_requests_total",
            "Read API requests by endpoint",
        ),
        &["endpoint"],
    )
    .expect("metric creation failed")
});

pub static API_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scratcher_api_errors_total",
            "Read API error responses by error code",
        ),
        &["code"],
    )
    .expect("metric creation failed")
});

pub static POLL_TRIGGERS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scratcher_poll_triggers_total",
            "On-demand poll triggers by outcome",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register server and poll engine metrics. Safe to call more than once.
pub fn register_metrics() {
    scratcher_poller::metrics::register_metrics();
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(API_REQUESTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(API_ERRORS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(POLL_TRIGGERS.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus text exposition.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}
