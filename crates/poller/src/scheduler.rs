//! Periodic and on-demand cycle triggering with a single run-lock.

use crate::error::PollResult;
use crate::metrics;
use crate::orchestrator::{CycleSummary, PollOrchestrator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Result of asking for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A cycle was started in the background.
    Started,
    /// A cycle is already in flight; nothing was started.
    AlreadyRunning,
}

/// Runs poll cycles, never more than one at a time.
///
/// Interval ticks and on-demand triggers share one run-lock. A trigger that
/// finds the lock held is dropped, never queued.
#[derive(Clone)]
pub struct Scheduler {
    orchestrator: Arc<PollOrchestrator>,
    run_lock: Arc<Mutex<()>>,
    last_summary: Arc<RwLock<Option<CycleSummary>>>,
    interval: Duration,
    run_on_startup: bool,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<PollOrchestrator>, interval: Duration, run_on_startup: bool) -> Self {
        Self {
            orchestrator,
            run_lock: Arc::new(Mutex::new(())),
            last_summary: Arc::new(RwLock::new(None)),
            interval,
            run_on_startup,
            cancel: CancellationToken::new(),
        }
    }

    /// Start a cycle in the background unless one is already running.
    pub fn trigger(&self) -> TriggerOutcome {
        let Some(guard) = self.try_acquire() else {
            return TriggerOutcome::AlreadyRunning;
        };
        let this = self.clone();
        tokio::spawn(async move {
            // Errors are logged by the orchestrator.
            let _ = this.execute(guard).await;
        });
        TriggerOutcome::Started
    }

    /// Run a cycle inline. Returns `None` if another cycle holds the lock.
    pub async fn run_now(&self) -> Option<PollResult<CycleSummary>> {
        let guard = self.try_acquire()?;
        Some(self.execute(guard).await)
    }

    /// Spawn the periodic driver. The first tick fires immediately when
    /// `run_on_startup` is set.
    pub fn start(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            if !this.run_on_startup {
                ticker.tick().await;
            }

            tracing::info!(
                interval_secs = this.interval.as_secs(),
                "Poll scheduler started"
            );

            loop {
                tokio::select! {
                    _ = this.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if this.trigger() == TriggerOutcome::AlreadyRunning {
                            tracing::info!("Previous poll cycle still running, tick dropped");
                        }
                    }
                }
            }

            tracing::info!("Poll scheduler stopped");
        })
    }

    /// Stop the periodic driver. An in-flight cycle runs to completion.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Wait until no cycle is running.
    pub async fn wait_idle(&self) {
        let _guard = self.run_lock.lock().await;
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Summary of the most recently completed cycle.
    pub async fn last_summary(&self) -> Option<CycleSummary> {
        self.last_summary.read().await.clone()
    }

    fn try_acquire(&self) -> Option<OwnedMutexGuard<()>> {
        match self.run_lock.clone().try_lock_owned() {
            Ok(guard) => Some(guard),
            Err(_) => {
                metrics::POLL_CYCLES_REJECTED.inc();
                None
            }
        }
    }

    async fn execute(&self, _guard: OwnedMutexGuard<()>) -> PollResult<CycleSummary> {
        let summary = self.orchestrator.run_cycle().await?;
        *self.last_summary.write().await = Some(summary.clone());
        Ok(summary)
    }
}
