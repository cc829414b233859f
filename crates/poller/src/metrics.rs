//! Prometheus metrics for the poll engine.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all scratcher metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static POLL_CYCLES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scratcher_poll_cycles_total",
            "Total number of poll cycles by result",
        ),
        &["result"],
    )
    .expect("metric creation failed")
});

pub static POLL_CYCLES_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "scratcher_poll_cycles_rejected_total",
        "Triggers and ticks dropped because a cycle was already running",
    )
    .expect("metric creation failed")
});

pub static SANDBOX_OUTCOMES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "scratcher_sandbox_polls_total",
            "Per-sandbox pipeline outcomes",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static CHANGES_WRITTEN: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "scratcher_changes_written_total",
        "Change rows inserted or updated",
    )
    .expect("metric creation failed")
});

pub static POLL_CYCLE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "scratcher_poll_cycle_duration_seconds",
            "Wall-clock duration of completed poll cycles",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
    )
    .expect("metric creation failed")
});

pub static LAST_CYCLE_FINISHED: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "scratcher_last_poll_cycle_finished_timestamp_seconds",
        "Unix time the last poll cycle finished",
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register poll metrics with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(POLL_CYCLES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(POLL_CYCLES_REJECTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SANDBOX_OUTCOMES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CHANGES_WRITTEN.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(POLL_CYCLE_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(LAST_CYCLE_FINISHED.clone()))
            .expect("metric registration failed");
    });
}
