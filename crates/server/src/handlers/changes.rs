//! Change listings.

use crate::error::ApiResult;
use crate::handlers::{LimitQuery, rfc3339};
use crate::metrics::API_REQUESTS;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Query, State};
use scratcher_core::{DEFAULT_RECENT_CHANGES_LIMIT, DEFAULT_SANDBOX_CHANGES_LIMIT};
use scratcher_metadata::models::{ChangeRow, RecentChangeRow};
use serde::Serialize;

/// One change, optionally annotated with its owning sandbox.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeResponse {
    /// Ledger change id; `null` for changes synthesized from category queries.
    pub id: Option<String>,
    pub member_type: String,
    pub member_name: String,
    pub revision_num: i32,
    pub changed_by: Option<String>,
    pub last_modified_date: String,
    #[serde(flatten)]
    pub sandbox: Option<ChangeSandbox>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSandbox {
    pub scratch_org_id: String,
    pub scratch_org_name: Option<String>,
    pub scratch_org_alias: Option<String>,
    pub scratch_org_username: String,
}

fn non_empty(change_id: &str) -> Option<String> {
    (!change_id.is_empty()).then(|| change_id.to_string())
}

impl From<RecentChangeRow> for ChangeResponse {
    fn from(row: RecentChangeRow) -> Self {
        Self {
            id: non_empty(&row.change_id),
            member_type: row.member_type,
            member_name: row.member_name,
            revision_num: row.revision_num,
            changed_by: row.changed_by,
            last_modified_date: rfc3339(row.last_modified_date),
            sandbox: Some(ChangeSandbox {
                scratch_org_id: row.org_id,
                scratch_org_name: row.org_name,
                scratch_org_alias: row.alias,
                scratch_org_username: row.username,
            }),
        }
    }
}

impl From<ChangeRow> for ChangeResponse {
    fn from(row: ChangeRow) -> Self {
        Self {
            id: row.change_id().map(str::to_string),
            member_type: row.member_type,
            member_name: row.member_name,
            revision_num: row.revision_num,
            changed_by: row.changed_by,
            last_modified_date: rfc3339(row.last_modified_date),
            sandbox: None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RecentChangesResponse {
    pub success: bool,
    pub count: usize,
    pub changes: Vec<ChangeResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxChangesResponse {
    pub success: bool,
    pub org_id: String,
    pub count: usize,
    pub changes: Vec<ChangeResponse>,
}

/// GET /api/changes - Most recent changes across active sandboxes.
pub async fn list_recent_changes(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<RecentChangesResponse>> {
    API_REQUESTS.with_label_values(&["changes"]).inc();
    let limit = query.resolve(DEFAULT_RECENT_CHANGES_LIMIT);

    let rows = state.metadata.list_recent_changes(limit).await?;
    let changes: Vec<ChangeResponse> = rows.into_iter().map(Into::into).collect();

    Ok(Json(RecentChangesResponse {
        success: true,
        count: changes.len(),
        changes,
    }))
}

/// GET /api/changes/{org_id} - Changes for one sandbox.
///
/// An unknown org id yields an empty list.
pub async fn list_sandbox_changes(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(query): Query<LimitQuery>,
) -> ApiResult<Json<SandboxChangesResponse>> {
    API_REQUESTS.with_label_values(&["sandbox_changes"]).inc();
    let limit = query.resolve(DEFAULT_SANDBOX_CHANGES_LIMIT);

    let rows = state
        .metadata
        .list_changes_for_sandbox(&org_id, limit)
        .await?;
    let changes: Vec<ChangeResponse> = rows.into_iter().map(Into::into).collect();

    Ok(Json(SandboxChangesResponse {
        success: true,
        org_id,
        count: changes.len(),
        changes,
    }))
}
