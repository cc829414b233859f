//! Test fixtures.

use scratcher_core::config::PollConfig;
use scratcher_core::{ArtifactCategory, Credentials, DiscoveredChange, SandboxStatus, SandboxSummary};
use scratcher_poller::CategoryRecord;
use std::time::Duration as StdDuration;
use time::macros::{date, datetime};
use time::{Duration, OffsetDateTime};

pub const BASE_TIME: OffsetDateTime = datetime!(2024-01-15 10:00 UTC);

/// An active sandbox as listed by the directory.
pub fn sandbox(org_id: &str, username: &str) -> SandboxSummary {
    SandboxSummary {
        record_id: format!("2SR{org_id}"),
        org_id: org_id.to_string(),
        org_name: Some(format!("Org {org_id}")),
        username: username.to_string(),
        status: SandboxStatus::Active,
        created_date: Some(BASE_TIME - Duration::days(1)),
        expiration_date: Some(date!(2024-01-22)),
    }
}

pub fn credentials_for(org_id: &str) -> Credentials {
    Credentials::new(
        format!("{org_id}!token"),
        format!("https://{}.my.example.com", org_id.to_lowercase()),
    )
}

/// A ledger change modified `minutes` after [`BASE_TIME`].
pub fn ledger_change(change_id: &str, name: &str, revision: i32, minutes: i64) -> DiscoveredChange {
    DiscoveredChange {
        change_id: Some(change_id.to_string()),
        member_type: "ApexClass".to_string(),
        member_name: name.to_string(),
        revision_num: revision,
        changed_by: Some("005000000000001".to_string()),
        last_modified_date: BASE_TIME + Duration::minutes(minutes),
    }
}

/// `count` category rows for `category`, the newest at `newest_minute`, one minute apart.
pub fn category_records(
    category: ArtifactCategory,
    count: usize,
    newest_minute: i64,
) -> Vec<CategoryRecord> {
    (0..count)
        .map(|i| CategoryRecord {
            name: format!("{category}{i}"),
            last_modified_by: Some("Dev User".to_string()),
            last_modified_date: BASE_TIME + Duration::minutes(newest_minute - i as i64),
        })
        .collect()
}

/// Poll configuration with short timeouts for tests.
pub fn poll_config(max_changes: usize) -> PollConfig {
    PollConfig {
        max_changes_per_sandbox: max_changes,
        concurrency: 2,
        request_timeout_secs: 5,
        ..PollConfig::default()
    }
}

pub const SHORT_TIMEOUT: StdDuration = StdDuration::from_millis(100);
