//! Sandbox listing.

use crate::error::ApiResult;
use crate::handlers::rfc3339;
use crate::metrics::API_REQUESTS;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use scratcher_metadata::models::SandboxRow;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxResponse {
    pub id: String,
    pub name: Option<String>,
    pub username: String,
    pub alias: Option<String>,
    pub status: String,
    pub created_date: Option<String>,
    pub expiration_date: Option<String>,
    pub last_polled_at: Option<String>,
}

impl From<SandboxRow> for SandboxResponse {
    fn from(row: SandboxRow) -> Self {
        Self {
            id: row.org_id,
            name: row.org_name,
            username: row.username,
            alias: row.alias,
            status: row.status,
            created_date: row.created_date.map(rfc3339),
            expiration_date: row.expiration_date.map(|d| d.to_string()),
            last_polled_at: row.last_polled_at.map(rfc3339),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SandboxesResponse {
    pub success: bool,
    pub count: usize,
    pub orgs: Vec<SandboxResponse>,
}

/// GET /api/orgs - Tracked sandboxes with status `Active`, newest first.
pub async fn list_sandboxes(State(state): State<AppState>) -> ApiResult<Json<SandboxesResponse>> {
    API_REQUESTS.with_label_values(&["orgs"]).inc();

    let orgs: Vec<SandboxResponse> = state
        .metadata
        .list_active_sandboxes()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Json(SandboxesResponse {
        success: true,
        count: orgs.len(),
        orgs,
    }))
}
