//! Directory authority client: lists the sandboxes currently considered active.

use crate::error::{PollError, PollResult};
use crate::rest::{RestClient, RestError};
use async_trait::async_trait;
use scratcher_core::config::DevHubConfig;
use scratcher_core::timestamp::{parse_optional_date, parse_optional_timestamp};
use scratcher_core::{SandboxStatus, SandboxSummary};
use serde::Deserialize;
use std::time::Duration;

/// Lists active sandboxes, newest-created first.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Fails with [`PollError::DirectoryUnavailable`] when the authority
    /// cannot be reached or rejects our credentials.
    async fn list_active(&self) -> PollResult<Vec<SandboxSummary>>;
}

const ACTIVE_SANDBOXES_QUERY: &str = "SELECT Id, ScratchOrg, OrgName, SignupUsername, \
     CreatedDate, ExpirationDate, Status FROM ActiveScratchOrg \
     WHERE Status = 'Active' ORDER BY CreatedDate DESC";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ActiveScratchOrgRecord {
    id: String,
    scratch_org: String,
    org_name: Option<String>,
    signup_username: String,
    created_date: Option<String>,
    expiration_date: Option<String>,
    status: String,
}

impl ActiveScratchOrgRecord {
    fn into_summary(self) -> scratcher_core::Result<SandboxSummary> {
        Ok(SandboxSummary {
            record_id: self.id,
            org_id: self.scratch_org,
            org_name: self.org_name,
            username: self.signup_username,
            status: SandboxStatus::parse(&self.status),
            created_date: parse_optional_timestamp(self.created_date.as_deref())?,
            expiration_date: parse_optional_date(self.expiration_date.as_deref())?,
        })
    }
}

/// Dev Hub backed directory using the OAuth username-password flow.
pub struct DevHubDirectory {
    http: reqwest::Client,
    config: DevHubConfig,
    username: String,
    password: String,
}

impl DevHubDirectory {
    pub fn new(config: &DevHubConfig, request_timeout: Duration) -> PollResult<Self> {
        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Err(PollError::Config(
                "devhub.username and devhub.password are required".to_string(),
            ));
        };
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| PollError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            config: config.clone(),
            username: username.clone(),
            password: password.clone(),
        })
    }

    async fn login(&self) -> Result<RestClient, RestError> {
        let url = format!(
            "{}/services/oauth2/token",
            self.config.login_url.trim_end_matches('/')
        );
        let password = format!(
            "{}{}",
            self.password,
            self.config.security_token.as_deref().unwrap_or("")
        );

        let mut form = vec![
            ("grant_type", "password"),
            ("client_id", self.config.client_id.as_str()),
            ("username", self.username.as_str()),
            ("password", password.as_str()),
        ];
        if let Some(secret) = &self.config.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self.http.post(url).form(&form).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(RestError::Status { status, body });
        }
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| RestError::Decode(e.to_string()))?;

        RestClient::new(
            self.http.clone(),
            &token.instance_url,
            &self.config.api_version,
            &token.access_token,
        )
    }
}

#[async_trait]
impl DirectoryClient for DevHubDirectory {
    async fn list_active(&self) -> PollResult<Vec<SandboxSummary>> {
        let client = self
            .login()
            .await
            .map_err(|e| PollError::DirectoryUnavailable(format!("login failed: {e}")))?;

        let records: Vec<ActiveScratchOrgRecord> = client
            .query(ACTIVE_SANDBOXES_QUERY)
            .await
            .map_err(|e| PollError::DirectoryUnavailable(e.to_string()))?;

        records
            .into_iter()
            .map(ActiveScratchOrgRecord::into_summary)
            .collect::<scratcher_core::Result<Vec<_>>>()
            .map_err(|e| PollError::DirectoryUnavailable(format!("malformed listing: {e}")))
    }
}
