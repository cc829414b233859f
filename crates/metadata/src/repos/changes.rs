//! Change repository trait.

use crate::error::MetadataResult;
use crate::models::{ChangeRow, NewChange, RecentChangeRow};
use async_trait::async_trait;

/// Repository for observed changes.
#[async_trait]
pub trait ChangeRepo: Send + Sync {
    /// Insert or update a batch of changes for one sandbox.
    ///
    /// Keyed by `(sandbox_id, change_id, member_name)`; re-observed keys get
    /// their revision, author and last-modified date overwritten. The batch is
    /// applied in a single transaction: either every row is written or none
    /// is. An empty batch is a no-op. Returns the number of rows written.
    async fn record_changes(&self, sandbox_id: i64, changes: &[NewChange]) -> MetadataResult<u64>;

    /// Most recently modified changes across active sandboxes.
    async fn list_recent_changes(&self, limit: u32) -> MetadataResult<Vec<RecentChangeRow>>;

    /// Most recently modified changes for one sandbox, by external org id.
    async fn list_changes_for_sandbox(
        &self,
        org_id: &str,
        limit: u32,
    ) -> MetadataResult<Vec<ChangeRow>>;

    /// Number of stored changes for a sandbox.
    async fn count_changes(&self, sandbox_id: i64) -> MetadataResult<u64>;
}
