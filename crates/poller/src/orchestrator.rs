//! Poll cycle orchestration.

use crate::connection::{Connector, RestConnector};
use crate::credentials::{self, CredentialProvider};
use crate::directory::{DevHubDirectory, DirectoryClient};
use crate::discovery::ChangeDiscovery;
use crate::error::{PollError, PollResult};
use crate::metrics;
use crate::pipeline::{PipelineDeps, PipelineState, SandboxOutcome, SandboxPipeline};
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use scratcher_core::SandboxSummary;
use scratcher_core::config::AppConfig;
use scratcher_metadata::MetadataStore;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::Instrument;

/// Counts from one completed cycle. Informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleSummary {
    pub sandboxes_seen: usize,
    /// Reached `Done`, including degraded sandboxes.
    pub sandboxes_polled: usize,
    /// Polled, but discovery or change persistence failed.
    pub sandboxes_degraded: usize,
    /// Credential resolution failed.
    pub sandboxes_skipped: usize,
    /// Skipped plus sandboxes whose row could not be written.
    pub sandboxes_failed: usize,
    pub changes_written: u64,
    pub started_at: OffsetDateTime,
    pub finished_at: OffsetDateTime,
}

impl CycleSummary {
    fn new(sandboxes_seen: usize, started_at: OffsetDateTime) -> Self {
        Self {
            sandboxes_seen,
            sandboxes_polled: 0,
            sandboxes_degraded: 0,
            sandboxes_skipped: 0,
            sandboxes_failed: 0,
            changes_written: 0,
            started_at,
            finished_at: started_at,
        }
    }

    fn record(&mut self, outcome: &SandboxOutcome) {
        self.changes_written += outcome.changes_written;
        let label = match &outcome.state {
            PipelineState::Done if outcome.degraded => {
                self.sandboxes_polled += 1;
                self.sandboxes_degraded += 1;
                "degraded"
            }
            PipelineState::Done => {
                self.sandboxes_polled += 1;
                "polled"
            }
            PipelineState::Skipped { .. } => {
                self.sandboxes_skipped += 1;
                self.sandboxes_failed += 1;
                "skipped"
            }
            _ => {
                self.sandboxes_failed += 1;
                "failed"
            }
        };
        metrics::SANDBOX_OUTCOMES.with_label_values(&[label]).inc();
        metrics::CHANGES_WRITTEN.inc_by(outcome.changes_written);
    }

    /// Wall-clock duration of the cycle.
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .try_into()
            .unwrap_or_default()
    }
}

/// Drives one full pass over every active sandbox.
pub struct PollOrchestrator {
    directory: Arc<dyn DirectoryClient>,
    deps: PipelineDeps,
    concurrency: usize,
}

impl PollOrchestrator {
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        credentials: Arc<dyn CredentialProvider>,
        connector: Arc<dyn Connector>,
        store: Arc<dyn MetadataStore>,
        config: &scratcher_core::config::PollConfig,
    ) -> Self {
        let request_timeout = config.request_timeout();
        Self {
            directory,
            deps: PipelineDeps {
                credentials,
                connector,
                discovery: ChangeDiscovery::new(config.categories.clone(), request_timeout),
                store,
                max_changes: config.max_changes_per_sandbox,
                request_timeout,
            },
            concurrency: config.concurrency.max(1),
        }
    }

    /// Wire the REST directory, configured credential provider and REST
    /// connector around `store`.
    pub fn from_config(config: &AppConfig, store: Arc<dyn MetadataStore>) -> PollResult<Self> {
        let timeout = config.poll.request_timeout();
        let directory = Arc::new(DevHubDirectory::new(&config.devhub, timeout)?);
        let connector = Arc::new(RestConnector::new(&config.devhub.api_version, timeout)?);
        let credentials = credentials::from_config(&config.credentials);
        Ok(Self::new(
            directory,
            credentials,
            connector,
            store,
            &config.poll,
        ))
    }

    /// Run one cycle.
    ///
    /// Only a directory failure is returned as an error; per-sandbox failures
    /// are logged and counted in the summary.
    pub async fn run_cycle(&self) -> PollResult<CycleSummary> {
        let started_at = OffsetDateTime::now_utc();
        tracing::info!("Starting poll cycle");

        let listing = tokio::time::timeout(self.deps.request_timeout, self.directory.list_active())
            .await
            .unwrap_or_else(|_| {
                Err(PollError::DirectoryUnavailable(format!(
                    "timed out after {:?}",
                    self.deps.request_timeout
                )))
            });

        let sandboxes = match listing {
            Ok(sandboxes) => sandboxes,
            Err(e) => {
                metrics::POLL_CYCLES
                    .with_label_values(&["directory_unavailable"])
                    .inc();
                tracing::error!(error = %e, "Poll cycle aborted: cannot list sandboxes");
                return Err(e);
            }
        };
        tracing::info!(count = sandboxes.len(), "Found active sandboxes");

        let mut summary = CycleSummary::new(sandboxes.len(), started_at);
        let outcomes: Vec<SandboxOutcome> = stream::iter(sandboxes)
            .map(|sandbox| self.poll_sandbox(sandbox))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in &outcomes {
            summary.record(outcome);
        }
        summary.finished_at = OffsetDateTime::now_utc();

        metrics::POLL_CYCLES.with_label_values(&["completed"]).inc();
        metrics::POLL_CYCLE_DURATION.observe(summary.duration().as_secs_f64());
        metrics::LAST_CYCLE_FINISHED.set(summary.finished_at.unix_timestamp());

        tracing::info!(
            seen = summary.sandboxes_seen,
            polled = summary.sandboxes_polled,
            degraded = summary.sandboxes_degraded,
            failed = summary.sandboxes_failed,
            changes = summary.changes_written,
            "Poll cycle complete"
        );
        Ok(summary)
    }

    /// Run one sandbox's pipeline, containing any panic to that sandbox.
    async fn poll_sandbox(&self, sandbox: SandboxSummary) -> SandboxOutcome {
        let span = tracing::info_span!(
            "sandbox",
            org_id = %sandbox.org_id,
            username = %sandbox.username
        );

        async {
            let pipeline = SandboxPipeline::new(&self.deps, sandbox.clone());
            match AssertUnwindSafe(pipeline.run()).catch_unwind().await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::error!("Sandbox pipeline panicked");
                    SandboxOutcome::panicked(&sandbox)
                }
            }
        }
        .instrument(span)
        .await
    }
}
