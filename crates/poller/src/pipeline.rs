//! Per-sandbox poll pipeline.
//!
//! Each sandbox moves through
//! `Resolve -> Upsert -> Discover -> Persist -> MarkPolled -> Done`, with
//! `Skipped` (no credentials) and `Failed` (sandbox row could not be written)
//! as the other terminal states. A discovery or change-persist failure does
//! not end the pipeline: it goes straight to `MarkPolled` and the outcome is
//! flagged degraded.

use crate::connection::Connector;
use crate::credentials::CredentialProvider;
use crate::discovery::ChangeDiscovery;
use crate::error::{PollError, PollResult};
use scratcher_core::{Credentials, DiscoveredChange, SandboxSummary};
use scratcher_metadata::MetadataStore;
use scratcher_metadata::models::{NewChange, NewSandbox};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Collaborators shared by every pipeline in a cycle.
pub struct PipelineDeps {
    pub credentials: Arc<dyn CredentialProvider>,
    pub connector: Arc<dyn Connector>,
    pub discovery: ChangeDiscovery,
    pub store: Arc<dyn MetadataStore>,
    pub max_changes: usize,
    pub request_timeout: Duration,
}

/// Pipeline state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    Resolve,
    Upsert { credentials: Credentials },
    Discover { sandbox_id: i64, credentials: Credentials },
    Persist { sandbox_id: i64, changes: Vec<DiscoveredChange> },
    MarkPolled { sandbox_id: i64 },
    Done,
    Skipped { reason: String },
    Failed { reason: String },
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Upsert { .. } => "upsert",
            Self::Discover { .. } => "discover",
            Self::Persist { .. } => "persist",
            Self::MarkPolled { .. } => "mark_polled",
            Self::Done => "done",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped { .. } | Self::Failed { .. })
    }
}

/// Final result of one sandbox's pipeline.
#[derive(Debug, Clone)]
pub struct SandboxOutcome {
    pub org_id: String,
    pub username: String,
    /// Terminal state.
    pub state: PipelineState,
    pub changes_written: u64,
    /// Polled, but discovery or change persistence failed.
    pub degraded: bool,
}

impl SandboxOutcome {
    /// Outcome for a pipeline that panicked before reaching a terminal state.
    pub fn panicked(sandbox: &SandboxSummary) -> Self {
        Self {
            org_id: sandbox.org_id.clone(),
            username: sandbox.username.clone(),
            state: PipelineState::Failed {
                reason: "pipeline panicked".to_string(),
            },
            changes_written: 0,
            degraded: false,
        }
    }
}

/// Apply the per-call timeout, mapping expiry onto the call's failure kind.
async fn bounded<T>(
    timeout: Duration,
    on_timeout: impl FnOnce(String) -> PollError,
    fut: impl Future<Output = PollResult<T>>,
) -> PollResult<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(format!("timed out after {timeout:?}"))),
    }
}

/// State machine driving one sandbox through a poll.
pub struct SandboxPipeline<'a> {
    deps: &'a PipelineDeps,
    sandbox: SandboxSummary,
    state: PipelineState,
    changes_written: u64,
    degraded: bool,
}

impl<'a> SandboxPipeline<'a> {
    pub fn new(deps: &'a PipelineDeps, sandbox: SandboxSummary) -> Self {
        Self {
            deps,
            sandbox,
            state: PipelineState::Resolve,
            changes_written: 0,
            degraded: false,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Advance one transition. A no-op once terminal.
    pub async fn step(&mut self) -> &PipelineState {
        let current = std::mem::replace(&mut self.state, PipelineState::Done);
        self.state = match current {
            PipelineState::Resolve => self.resolve().await,
            PipelineState::Upsert { credentials } => self.upsert(credentials).await,
            PipelineState::Discover {
                sandbox_id,
                credentials,
            } => self.discover(sandbox_id, credentials).await,
            PipelineState::Persist {
                sandbox_id,
                changes,
            } => self.persist(sandbox_id, changes).await,
            PipelineState::MarkPolled { sandbox_id } => self.mark_polled(sandbox_id).await,
            terminal => terminal,
        };
        &self.state
    }

    /// Drive the pipeline to a terminal state.
    pub async fn run(mut self) -> SandboxOutcome {
        while !self.state.is_terminal() {
            self.step().await;
        }
        SandboxOutcome {
            org_id: self.sandbox.org_id,
            username: self.sandbox.username,
            state: self.state,
            changes_written: self.changes_written,
            degraded: self.degraded,
        }
    }

    async fn resolve(&self) -> PipelineState {
        let username = self.sandbox.username.clone();
        let result = bounded(
            self.deps.request_timeout,
            |reason| PollError::Credential { username, reason },
            self.deps.credentials.resolve(&self.sandbox),
        )
        .await;

        match result {
            Ok(credentials) => PipelineState::Upsert { credentials },
            Err(e) => {
                tracing::warn!(error = %e, "Could not authenticate to sandbox, skipping");
                PipelineState::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn upsert(&self, credentials: Credentials) -> PipelineState {
        let record =
            NewSandbox::from_observation(&self.sandbox, &credentials, OffsetDateTime::now_utc());
        match self.deps.store.upsert_sandbox(&record).await {
            Ok(sandbox_id) => PipelineState::Discover {
                sandbox_id,
                credentials,
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to store sandbox");
                PipelineState::Failed {
                    reason: PollError::from(e).to_string(),
                }
            }
        }
    }

    async fn discover(&mut self, sandbox_id: i64, credentials: Credentials) -> PipelineState {
        let connection = bounded(
            self.deps.request_timeout,
            PollError::Connection,
            self.deps.connector.connect(&self.sandbox, &credentials),
        )
        .await;

        let connection = match connection {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!(error = %e, "Could not query changes");
                self.degraded = true;
                return PipelineState::MarkPolled { sandbox_id };
            }
        };

        let discovery = self
            .deps
            .discovery
            .discover(connection.as_ref(), self.deps.max_changes)
            .await;
        if !discovery.is_complete() {
            self.degraded = true;
        }
        tracing::info!(
            changes = discovery.changes.len(),
            mode = ?discovery.mode,
            "Discovered changes"
        );

        PipelineState::Persist {
            sandbox_id,
            changes: discovery.changes,
        }
    }

    async fn persist(&mut self, sandbox_id: i64, changes: Vec<DiscoveredChange>) -> PipelineState {
        let batch: Vec<NewChange> = changes.into_iter().map(NewChange::from).collect();
        match self.deps.store.record_changes(sandbox_id, &batch).await {
            Ok(written) => self.changes_written = written,
            Err(e) => {
                tracing::error!(error = %e, changes = batch.len(), "Failed to persist changes, batch rolled back");
                self.degraded = true;
            }
        }
        PipelineState::MarkPolled { sandbox_id }
    }

    async fn mark_polled(&self, sandbox_id: i64) -> PipelineState {
        match self
            .deps
            .store
            .mark_polled(sandbox_id, OffsetDateTime::now_utc())
            .await
        {
            Ok(()) => PipelineState::Done,
            Err(e) => {
                tracing::error!(error = %e, "Failed to mark sandbox polled");
                PipelineState::Failed {
                    reason: PollError::from(e).to_string(),
                }
            }
        }
    }
}
