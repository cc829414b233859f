//! Two-tier change discovery tests.

mod common;

use common::*;
use scratcher_core::ArtifactCategory;
use scratcher_poller::{ChangeDiscovery, DiscoveryMode, OrgConnection};
use std::time::Duration;

fn discovery() -> ChangeDiscovery {
    ChangeDiscovery::new(ArtifactCategory::ALL.to_vec(), Duration::from_secs(5))
}

fn all_categories_org(per_category_available: usize) -> MockOrg {
    ArtifactCategory::ALL
        .into_iter()
        .enumerate()
        .fold(MockOrg::without_ledger(), |org, (i, category)| {
            // Interleave timestamps across categories.
            org.category(
                category,
                category_records(category, per_category_available, 100 - i as i64),
            )
        })
}

#[tokio::test]
async fn test_ledger_results_are_used_when_available() {
    let conn = MockOrgHandle::new(MockOrg::with_ledger(vec![
        ledger_change("0MZ000000000003", "C", 3, 30),
        ledger_change("0MZ000000000002", "B", 2, 20),
        ledger_change("0MZ000000000001", "A", 1, 10),
    ]));

    let result = discovery().discover(&conn, 50).await;

    assert_eq!(result.mode, DiscoveryMode::Ledger);
    assert_eq!(result.changes.len(), 3);
    assert_eq!(result.changes[0].change_id.as_deref(), Some("0MZ000000000003"));
    assert_eq!(result.changes[0].revision_num, 3);
    assert_eq!(conn.ledger_limits(), vec![50]);
    assert!(conn.category_limits().is_empty());
}

#[tokio::test]
async fn test_fallback_splits_limit_across_four_categories() {
    let conn = MockOrgHandle::new(all_categories_org(7));

    let result = discovery().discover(&conn, 20).await;

    assert_eq!(
        result.mode,
        DiscoveryMode::Fallback {
            failed_categories: vec![]
        }
    );
    let limits = conn.category_limits();
    assert_eq!(limits.len(), 4);
    assert!(limits.iter().all(|(_, limit)| *limit == 5));

    assert_eq!(result.changes.len(), 20);
    assert!(
        result
            .changes
            .windows(2)
            .all(|w| w[0].last_modified_date >= w[1].last_modified_date)
    );
    for change in &result.changes {
        assert_eq!(change.change_id, None);
        assert_eq!(change.revision_num, 1);
    }
    for category in ArtifactCategory::ALL {
        let count = result
            .changes
            .iter()
            .filter(|c| c.member_type == category.as_str())
            .count();
        assert_eq!(count, 5, "{category}");
    }
}

#[tokio::test]
async fn test_failing_category_contributes_nothing() {
    let conn = MockOrgHandle::new(all_categories_org(5).failing_category(ArtifactCategory::ApexPage));

    let result = discovery().discover(&conn, 20).await;

    assert_eq!(
        result.mode,
        DiscoveryMode::Fallback {
            failed_categories: vec![ArtifactCategory::ApexPage]
        }
    );
    assert!(!result.is_complete());
    assert_eq!(result.changes.len(), 15);
    assert!(result.changes.iter().all(|c| c.member_type != "ApexPage"));
}

#[tokio::test]
async fn test_fallback_result_never_exceeds_max() {
    let conn = MockOrgHandle::new(all_categories_org(10));

    let result = discovery().discover(&conn, 10).await;

    // floor(10 / 4) = 2 per category.
    assert!(conn.category_limits().iter().all(|(_, limit)| *limit == 2));
    assert_eq!(result.changes.len(), 8);
}

#[tokio::test]
async fn test_missing_author_becomes_unknown() {
    let mut records = category_records(ArtifactCategory::ApexClass, 1, 0);
    records[0].last_modified_by = None;
    let conn = MockOrgHandle::new(MockOrg::without_ledger().category(ArtifactCategory::ApexClass, records));

    let result = discovery().discover(&conn, 8).await;

    assert_eq!(result.changes.len(), 1);
    assert_eq!(result.changes[0].changed_by.as_deref(), Some("Unknown"));
}

#[tokio::test]
async fn test_zero_max_results_queries_nothing() {
    let conn = MockOrgHandle::new(all_categories_org(3));

    let result = discovery().discover(&conn, 0).await;

    assert!(result.changes.is_empty());
    assert!(conn.ledger_limits().is_empty());
    assert!(conn.category_limits().is_empty());
}

#[tokio::test]
async fn test_slow_ledger_times_out_into_fallback() {
    let mut org = all_categories_org(2);
    org.ledger = Some(Ok(vec![ledger_change("0MZ000000000001", "Slow", 1, 0)]));
    org.ledger_delay = Some(Duration::from_secs(30));
    let conn = MockOrgHandle::new(org);

    let result = ChangeDiscovery::new(ArtifactCategory::ALL.to_vec(), SHORT_TIMEOUT)
        .discover(&conn as &dyn OrgConnection, 8)
        .await;

    assert!(matches!(result.mode, DiscoveryMode::Fallback { .. }));
    assert_eq!(result.changes.len(), 8);
    assert!(result.changes.iter().all(|c| c.member_name != "Slow"));
}
