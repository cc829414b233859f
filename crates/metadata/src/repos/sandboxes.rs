//! Sandbox repository trait.

use crate::error::MetadataResult;
use crate::models::{NewSandbox, SandboxRow};
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for tracked sandboxes.
#[async_trait]
pub trait SandboxRepo: Send + Sync {
    /// Insert or refresh a sandbox keyed by its external org id.
    ///
    /// Mutable fields (name, username, alias, endpoint, tokens, status,
    /// expiration) are overwritten and `updated_at` is set to
    /// `observed_at`. The creation date and `created_at` are kept from the
    /// first observation. Returns the internal row id.
    async fn upsert_sandbox(&self, sandbox: &NewSandbox) -> MetadataResult<i64>;

    /// Set `last_polled_at` for a sandbox.
    async fn mark_polled(&self, sandbox_id: i64, at: OffsetDateTime) -> MetadataResult<()>;

    /// Get a sandbox by external org id.
    async fn get_sandbox_by_org_id(&self, org_id: &str) -> MetadataResult<Option<SandboxRow>>;

    /// List sandboxes with status `Active`, newest creation date first.
    async fn list_active_sandboxes(&self) -> MetadataResult<Vec<SandboxRow>>;
}
