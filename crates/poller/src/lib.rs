//! Poll/sync engine for scratcher.
//!
//! For every active sandbox listed by the directory authority, a cycle
//! resolves credentials, stores the sandbox, discovers recent changes
//! (change ledger first, per-category queries as fallback) and persists them
//! idempotently. Failures are contained to the sandbox they occur in.

pub mod connection;
pub mod credentials;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod pipeline;
pub mod rest;
pub mod scheduler;

pub use connection::{CategoryRecord, Connector, OrgConnection, OrgIdentity, RestConnector};
pub use credentials::{CredentialProvider, SfCliCredentials, StaticCredentials};
pub use directory::{DevHubDirectory, DirectoryClient};
pub use discovery::{ChangeDiscovery, Discovery, DiscoveryMode};
pub use error::{PollError, PollResult};
pub use orchestrator::{CycleSummary, PollOrchestrator};
pub use pipeline::{PipelineDeps, PipelineState, SandboxOutcome, SandboxPipeline};
pub use scheduler::{Scheduler, TriggerOutcome};
