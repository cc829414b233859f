//! Database models mapping to the change store schema.

use scratcher_core::{Credentials, DiscoveredChange, SandboxSummary};
use sqlx::FromRow;
use std::collections::HashMap;
use time::{Date, OffsetDateTime};

// =============================================================================
// Sandboxes
// =============================================================================

/// Stored sandbox record, one per external org id.
#[derive(Debug, Clone, FromRow)]
pub struct SandboxRow {
    pub id: i64,
    pub org_id: String,
    pub org_name: Option<String>,
    pub username: String,
    pub alias: Option<String>,
    pub instance_url: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub status: String,
    pub created_date: Option<OffsetDateTime>,
    pub expiration_date: Option<Date>,
    pub last_polled_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Input for [`SandboxRepo::upsert_sandbox`](crate::repos::SandboxRepo::upsert_sandbox).
#[derive(Debug, Clone)]
pub struct NewSandbox {
    pub org_id: String,
    pub org_name: Option<String>,
    pub username: String,
    pub alias: Option<String>,
    pub instance_url: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub status: String,
    pub created_date: Option<OffsetDateTime>,
    pub expiration_date: Option<Date>,
    /// When the directory reported this sandbox; becomes `updated_at`.
    pub observed_at: OffsetDateTime,
}

impl NewSandbox {
    /// Build an upsert record from a directory entry and its freshly resolved credentials.
    ///
    /// The directory-reported status is stored as-is.
    pub fn from_observation(
        summary: &SandboxSummary,
        credentials: &Credentials,
        observed_at: OffsetDateTime,
    ) -> Self {
        Self {
            org_id: summary.org_id.clone(),
            org_name: summary.org_name.clone(),
            username: summary.username.clone(),
            alias: None,
            instance_url: credentials.instance_url.clone(),
            access_token: Some(credentials.access_token.clone()),
            refresh_token: None,
            status: summary.status.as_str().to_string(),
            created_date: summary.created_date,
            expiration_date: summary.expiration_date,
            observed_at,
        }
    }
}

// =============================================================================
// Changes
// =============================================================================

/// Stored change record.
///
/// `change_id` is empty for changes discovered without a change ledger.
#[derive(Debug, Clone, FromRow)]
pub struct ChangeRow {
    pub id: i64,
    pub sandbox_id: i64,
    pub change_id: String,
    pub member_type: String,
    pub member_name: String,
    pub revision_num: i32,
    pub changed_by: Option<String>,
    pub last_modified_date: OffsetDateTime,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ChangeRow {
    /// The change identifier, or `None` for synthesized fallback entries.
    pub fn change_id(&self) -> Option<&str> {
        (!self.change_id.is_empty()).then_some(self.change_id.as_str())
    }
}

/// Change joined with its owning sandbox, for cross-sandbox listings.
#[derive(Debug, Clone, FromRow)]
pub struct RecentChangeRow {
    pub id: i64,
    pub change_id: String,
    pub member_type: String,
    pub member_name: String,
    pub revision_num: i32,
    pub changed_by: Option<String>,
    pub last_modified_date: OffsetDateTime,
    pub org_id: String,
    pub org_name: Option<String>,
    pub alias: Option<String>,
    pub username: String,
}

/// Input for [`ChangeRepo::record_changes`](crate::repos::ChangeRepo::record_changes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChange {
    pub change_id: Option<String>,
    pub member_type: String,
    pub member_name: String,
    pub revision_num: i32,
    pub changed_by: Option<String>,
    pub last_modified_date: OffsetDateTime,
}

impl NewChange {
    /// Value stored in the `change_id` column; part of the uniqueness key.
    pub fn change_key(&self) -> &str {
        self.change_id.as_deref().unwrap_or("")
    }
}

/// Collapse entries that share a storage key, keeping the last one in the
/// position of the first. One batch then writes each row once.
pub fn collapse_by_key(changes: &[NewChange]) -> Vec<&NewChange> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::with_capacity(changes.len());
    let mut collapsed: Vec<&NewChange> = Vec::with_capacity(changes.len());

    for change in changes {
        let key = (change.change_key(), change.member_name.as_str());
        match index.get(&key) {
            Some(&slot) => collapsed[slot] = change,
            None => {
                index.insert(key, collapsed.len());
                collapsed.push(change);
            }
        }
    }
    collapsed
}

impl From<&DiscoveredChange> for NewChange {
    fn from(change: &DiscoveredChange) -> Self {
        Self {
            change_id: change.change_id.clone(),
            member_type: change.member_type.clone(),
            member_name: change.member_name.clone(),
            revision_num: change.revision_num,
            changed_by: change.changed_by.clone(),
            last_modified_date: change.last_modified_date,
        }
    }
}

impl From<DiscoveredChange> for NewChange {
    fn from(change: DiscoveredChange) -> Self {
        Self {
            change_id: change.change_id,
            member_type: change.member_type,
            member_name: change.member_name,
            revision_num: change.revision_num,
            changed_by: change.changed_by,
            last_modified_date: change.last_modified_date,
        }
    }
}
