//! Test fixtures.

use scratcher_core::{Credentials, DiscoveredChange, SandboxStatus, SandboxSummary};
use scratcher_metadata::MetadataStore;
use scratcher_metadata::models::{NewChange, NewSandbox};
use time::macros::{date, datetime};
use time::{Duration, OffsetDateTime};

pub const BASE_TIME: OffsetDateTime = datetime!(2024-01-15 10:00 UTC);

#[allow(dead_code)]
pub fn sandbox(org_id: &str, username: &str, created_hours: i64) -> SandboxSummary {
    SandboxSummary {
        record_id: format!("2SR{org_id}"),
        org_id: org_id.to_string(),
        org_name: Some(format!("Org {org_id}")),
        username: username.to_string(),
        status: SandboxStatus::Active,
        created_date: Some(BASE_TIME + Duration::hours(created_hours)),
        expiration_date: Some(date!(2024-01-22)),
    }
}

/// Insert a sandbox row as the poller would, returning its row id.
#[allow(dead_code)]
pub async fn seed_sandbox(store: &dyn MetadataStore, summary: &SandboxSummary) -> i64 {
    let credentials = Credentials::new(
        format!("{}!token", summary.org_id),
        "https://example.my.salesforce.com",
    );
    let record = NewSandbox::from_observation(summary, &credentials, BASE_TIME);
    store
        .upsert_sandbox(&record)
        .await
        .expect("Failed to seed sandbox")
}

/// A change modified `minutes` after [`BASE_TIME`]. `None` ids are
/// category-synthesized changes.
#[allow(dead_code)]
pub fn change(change_id: Option<&str>, name: &str, minutes: i64) -> NewChange {
    NewChange::from(DiscoveredChange {
        change_id: change_id.map(str::to_string),
        member_type: "ApexClass".to_string(),
        member_name: name.to_string(),
        revision_num: 3,
        changed_by: Some("Dev User".to_string()),
        last_modified_date: BASE_TIME + Duration::minutes(minutes),
    })
}

#[allow(dead_code)]
pub async fn seed_changes(store: &dyn MetadataStore, sandbox_id: i64, changes: &[NewChange]) {
    store
        .record_changes(sandbox_id, changes)
        .await
        .expect("Failed to seed changes");
}
