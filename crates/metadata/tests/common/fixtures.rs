//! Test fixtures.

use scratcher_metadata::models::{NewChange, NewSandbox};
use time::{Duration, OffsetDateTime};
use time::macros::{date, datetime};

/// Fixed reference time so ordering assertions are deterministic.
pub const BASE_TIME: OffsetDateTime = datetime!(2024-01-15 10:00 UTC);

/// A directory observation for an active sandbox.
pub fn new_sandbox(org_id: &str) -> NewSandbox {
    NewSandbox {
        org_id: org_id.to_string(),
        org_name: Some(format!("Org {org_id}")),
        username: format!("{}@example.com", org_id.to_lowercase()),
        alias: None,
        instance_url: format!("https://{}.my.example.com", org_id.to_lowercase()),
        access_token: Some("token-1".to_string()),
        refresh_token: None,
        status: "Active".to_string(),
        created_date: Some(BASE_TIME - Duration::days(1)),
        expiration_date: Some(date!(2024-01-22)),
        observed_at: BASE_TIME,
    }
}

/// A ledger change modified `minutes` after [`BASE_TIME`].
pub fn ledger_change(change_id: &str, name: &str, revision: i32, minutes: i64) -> NewChange {
    NewChange {
        change_id: Some(change_id.to_string()),
        member_type: "ApexClass".to_string(),
        member_name: name.to_string(),
        revision_num: revision,
        changed_by: Some("Dev User".to_string()),
        last_modified_date: BASE_TIME + Duration::minutes(minutes),
    }
}

/// A change synthesized from a category query (no change id, revision 1).
pub fn fallback_change(member_type: &str, name: &str, minutes: i64) -> NewChange {
    NewChange {
        change_id: None,
        member_type: member_type.to_string(),
        member_name: name.to_string(),
        revision_num: 1,
        changed_by: Some("Unknown".to_string()),
        last_modified_date: BASE_TIME + Duration::minutes(minutes),
    }
}
