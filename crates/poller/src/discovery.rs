//! Two-tier change discovery.
//!
//! The change ledger is queried first. If that query fails outright, each
//! configured artifact category is queried on its own, the results merged
//! newest first and truncated. The two tiers never mix within one call.

use crate::connection::{CategoryRecord, OrgConnection};
use crate::error::PollError;
use futures::future::join_all;
use scratcher_core::{ArtifactCategory, DiscoveredChange};
use std::time::Duration;

/// Author recorded for category rows that carry no modifier.
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Which tier produced a [`Discovery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMode {
    Ledger,
    Fallback {
        failed_categories: Vec<ArtifactCategory>,
    },
}

/// Changes found in one sandbox, newest first.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub mode: DiscoveryMode,
    pub changes: Vec<DiscoveredChange>,
}

impl Discovery {
    /// True when no category query failed.
    pub fn is_complete(&self) -> bool {
        match &self.mode {
            DiscoveryMode::Ledger => true,
            DiscoveryMode::Fallback { failed_categories } => failed_categories.is_empty(),
        }
    }
}

/// Discovers recently changed artifacts in a sandbox.
#[derive(Debug, Clone)]
pub struct ChangeDiscovery {
    categories: Vec<ArtifactCategory>,
    query_timeout: Duration,
}

impl ChangeDiscovery {
    pub fn new(categories: Vec<ArtifactCategory>, query_timeout: Duration) -> Self {
        Self {
            categories,
            query_timeout,
        }
    }

    pub fn categories(&self) -> &[ArtifactCategory] {
        &self.categories
    }

    /// Discover at most `max_results` changes.
    pub async fn discover(&self, conn: &dyn OrgConnection, max_results: usize) -> Discovery {
        if max_results == 0 {
            return Discovery {
                mode: DiscoveryMode::Ledger,
                changes: Vec::new(),
            };
        }

        let ledger = tokio::time::timeout(self.query_timeout, conn.query_ledger(max_results))
            .await
            .unwrap_or_else(|_| {
                Err(PollError::PrimaryDiscovery(format!(
                    "timed out after {:?}",
                    self.query_timeout
                )))
            });

        match ledger {
            Ok(mut changes) => {
                changes.truncate(max_results);
                Discovery {
                    mode: DiscoveryMode::Ledger,
                    changes,
                }
            }
            Err(e) => {
                tracing::info!(error = %e, "Change ledger unavailable, querying artifact categories");
                self.discover_by_category(conn, max_results).await
            }
        }
    }

    async fn discover_by_category(&self, conn: &dyn OrgConnection, max_results: usize) -> Discovery {
        let per_category = max_results / self.categories.len().max(1);
        let mut failed_categories = Vec::new();
        let mut changes = Vec::new();

        if per_category == 0 {
            tracing::debug!(max_results, "Per-category limit is zero, nothing to query");
            return Discovery {
                mode: DiscoveryMode::Fallback { failed_categories },
                changes,
            };
        }

        let queries = self.categories.iter().map(|&category| async move {
            let result =
                tokio::time::timeout(self.query_timeout, conn.query_category(category, per_category))
                    .await
                    .unwrap_or_else(|_| {
                        Err(PollError::CategoryDiscovery {
                            category,
                            reason: format!("timed out after {:?}", self.query_timeout),
                        })
                    });
            (category, result)
        });

        for (category, result) in join_all(queries).await {
            match result {
                Ok(records) => changes.extend(
                    records
                        .into_iter()
                        .take(per_category)
                        .map(|record| synthesize(category, record)),
                ),
                Err(e) => {
                    tracing::warn!(category = %category, error = %e, "Category query failed, skipping");
                    failed_categories.push(category);
                }
            }
        }

        // Stable sort keeps category order among equal timestamps.
        changes.sort_by(|a, b| b.last_modified_date.cmp(&a.last_modified_date));
        changes.truncate(max_results);

        Discovery {
            mode: DiscoveryMode::Fallback { failed_categories },
            changes,
        }
    }
}

/// Category rows carry no change id or revision history.
fn synthesize(category: ArtifactCategory, record: CategoryRecord) -> DiscoveredChange {
    DiscoveredChange {
        change_id: None,
        member_type: category.as_str().to_string(),
        member_name: record.name,
        revision_num: 1,
        changed_by: Some(
            record
                .last_modified_by
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
        ),
        last_modified_date: record.last_modified_date,
    }
}
