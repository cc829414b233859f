//! Sessions against individual sandboxes.

use crate::error::{PollError, PollResult};
use crate::rest::RestClient;
use async_trait::async_trait;
use scratcher_core::timestamp::parse_timestamp;
use scratcher_core::{ArtifactCategory, Credentials, DiscoveredChange, SandboxSummary};
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;

/// Identity of the user a session is authenticated as.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrgIdentity {
    pub user_id: String,
    pub organization_id: String,
    #[serde(default)]
    pub preferred_username: Option<String>,
}

/// One artifact row returned by a category query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub name: String,
    pub last_modified_by: Option<String>,
    pub last_modified_date: OffsetDateTime,
}

/// An established session against one sandbox.
#[async_trait]
pub trait OrgConnection: Send + Sync {
    /// Check that the session is usable.
    async fn identity(&self) -> PollResult<OrgIdentity>;

    /// Query the change ledger for non-obsolete members, newest first.
    async fn query_ledger(&self, limit: usize) -> PollResult<Vec<DiscoveredChange>>;

    /// Query one artifact category directly, newest first.
    async fn query_category(
        &self,
        category: ArtifactCategory,
        limit: usize,
    ) -> PollResult<Vec<CategoryRecord>>;
}

/// Opens verified sessions against sandboxes.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        sandbox: &SandboxSummary,
        credentials: &Credentials,
    ) -> PollResult<Box<dyn OrgConnection>>;
}

/// REST API connector.
pub struct RestConnector {
    http: reqwest::Client,
    api_version: String,
}

impl RestConnector {
    pub fn new(api_version: impl Into<String>, request_timeout: Duration) -> PollResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PollError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_version: api_version.into(),
        })
    }
}

#[async_trait]
impl Connector for RestConnector {
    async fn connect(
        &self,
        sandbox: &SandboxSummary,
        credentials: &Credentials,
    ) -> PollResult<Box<dyn OrgConnection>> {
        let client = RestClient::new(
            self.http.clone(),
            &credentials.instance_url,
            &self.api_version,
            &credentials.access_token,
        )
        .map_err(|e| PollError::Connection(format!("{}: {e}", sandbox.username)))?;

        let connection = RestConnection::new(client);
        let identity = connection.identity().await?;
        tracing::debug!(
            org_id = %sandbox.org_id,
            user_id = %identity.user_id,
            "Connected to sandbox"
        );

        Ok(Box::new(connection))
    }
}

/// REST-backed [`OrgConnection`].
pub struct RestConnection {
    client: RestClient,
}

impl RestConnection {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SourceMemberRecord {
    id: String,
    member_type: String,
    member_name: String,
    #[serde(alias = "RevisionNum")]
    revision_counter: Option<i64>,
    changed_by: Option<String>,
    last_modified_date: String,
}

impl SourceMemberRecord {
    fn into_change(self) -> scratcher_core::Result<DiscoveredChange> {
        Ok(DiscoveredChange {
            change_id: Some(self.id),
            member_type: self.member_type,
            member_name: self.member_name,
            revision_num: self
                .revision_counter
                .and_then(|r| i32::try_from(r).ok())
                .unwrap_or(1),
            changed_by: self.changed_by,
            last_modified_date: parse_timestamp(&self.last_modified_date)?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UserRef {
    #[serde(rename = "Name")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ArtifactRecord {
    name: String,
    last_modified_date: String,
    last_modified_by: Option<UserRef>,
}

impl ArtifactRecord {
    fn into_record(self) -> scratcher_core::Result<CategoryRecord> {
        Ok(CategoryRecord {
            name: self.name,
            last_modified_by: self.last_modified_by.and_then(|u| u.name),
            last_modified_date: parse_timestamp(&self.last_modified_date)?,
        })
    }
}

#[async_trait]
impl OrgConnection for RestConnection {
    async fn identity(&self) -> PollResult<OrgIdentity> {
        self.client
            .get_json("/services/oauth2/userinfo")
            .await
            .map_err(|e| PollError::Connection(e.to_string()))
    }

    async fn query_ledger(&self, limit: usize) -> PollResult<Vec<DiscoveredChange>> {
        let soql = format!(
            "SELECT Id, MemberType, MemberName, RevisionCounter, ChangedBy, LastModifiedDate \
             FROM SourceMember WHERE IsNameObsolete = false \
             ORDER BY LastModifiedDate DESC LIMIT {limit}"
        );
        let records: Vec<SourceMemberRecord> = self
            .client
            .tooling_query(&soql)
            .await
            .map_err(|e| PollError::PrimaryDiscovery(e.to_string()))?;

        records
            .into_iter()
            .map(SourceMemberRecord::into_change)
            .collect::<scratcher_core::Result<Vec<_>>>()
            .map_err(|e| PollError::PrimaryDiscovery(e.to_string()))
    }

    async fn query_category(
        &self,
        category: ArtifactCategory,
        limit: usize,
    ) -> PollResult<Vec<CategoryRecord>> {
        let soql = format!(
            "SELECT Id, Name, LastModifiedDate, LastModifiedBy.Name FROM {category} \
             WHERE NamespacePrefix = null ORDER BY LastModifiedDate DESC LIMIT {limit}"
        );
        let fail = |reason: String| PollError::CategoryDiscovery { category, reason };

        let records: Vec<ArtifactRecord> = self
            .client
            .query(&soql)
            .await
            .map_err(|e| fail(e.to_string()))?;

        records
            .into_iter()
            .map(ArtifactRecord::into_record)
            .collect::<scratcher_core::Result<Vec<_>>>()
            .map_err(|e| fail(e.to_string()))
    }
}
