//! Credential providers: turn a sandbox identity into a short-lived session.

use crate::error::{PollError, PollResult};
use async_trait::async_trait;
use scratcher_core::config::{CredentialsConfig, StaticCredential};
use scratcher_core::{Credentials, SandboxSummary};
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Resolves access credentials for one sandbox.
///
/// Failures are reported as [`PollError::Credential`] and only skip the
/// affected sandbox.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve(&self, sandbox: &SandboxSummary) -> PollResult<Credentials>;
}

/// Build the configured credential provider.
pub fn from_config(config: &CredentialsConfig) -> Arc<dyn CredentialProvider> {
    match config {
        CredentialsConfig::SfCli { binary } => Arc::new(SfCliCredentials::new(binary.clone())),
        CredentialsConfig::Static { orgs } => Arc::new(StaticCredentials::from_config(orgs)),
    }
}

/// Asks the locally authenticated `sf` CLI for a sandbox's current session.
pub struct SfCliCredentials {
    binary: String,
}

#[derive(Debug, Deserialize)]
struct OrgDisplayOutput {
    result: Option<OrgDisplayResult>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrgDisplayResult {
    access_token: Option<String>,
    instance_url: Option<String>,
}

impl SfCliCredentials {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

/// Parse `sf org display --json` output.
fn parse_org_display(username: &str, stdout: &[u8]) -> PollResult<Credentials> {
    let fail = |reason: String| PollError::Credential {
        username: username.to_string(),
        reason,
    };

    let output: OrgDisplayOutput =
        serde_json::from_slice(stdout).map_err(|e| fail(format!("unreadable CLI output: {e}")))?;

    let Some(result) = output.result else {
        return Err(fail(
            output
                .message
                .unwrap_or_else(|| "could not get org credentials".to_string()),
        ));
    };

    match (result.access_token, result.instance_url) {
        (Some(token), Some(url)) if !token.is_empty() && !url.is_empty() => {
            Ok(Credentials::new(token, url))
        }
        _ => Err(fail(
            "CLI output is missing accessToken or instanceUrl".to_string(),
        )),
    }
}

#[async_trait]
impl CredentialProvider for SfCliCredentials {
    async fn resolve(&self, sandbox: &SandboxSummary) -> PollResult<Credentials> {
        let output = Command::new(&self.binary)
            .args(["org", "display", "--target-org", &sandbox.username, "--json"])
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PollError::Credential {
                username: sandbox.username.clone(),
                reason: format!("failed to run {}: {e}", self.binary),
            })?;

        if !output.status.success() {
            // The CLI still prints a JSON error document on failure.
            let reason = match serde_json::from_slice::<OrgDisplayOutput>(&output.stdout) {
                Ok(OrgDisplayOutput {
                    message: Some(message),
                    ..
                }) => message,
                _ => format!(
                    "{} exited with {}: {}",
                    self.binary,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            };
            return Err(PollError::Credential {
                username: sandbox.username.clone(),
                reason,
            });
        }

        parse_org_display(&sandbox.username, &output.stdout)
    }
}

/// Fixed credentials keyed by login username.
#[derive(Default)]
pub struct StaticCredentials {
    by_username: HashMap<String, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, username: impl Into<String>, credentials: Credentials) -> Self {
        self.by_username.insert(username.into(), credentials);
        self
    }

    pub fn from_config(orgs: &[StaticCredential]) -> Self {
        orgs.iter().fold(Self::new(), |acc, org| {
            acc.with(
                org.username.clone(),
                Credentials::new(org.access_token.clone(), org.instance_url.clone()),
            )
        })
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn resolve(&self, sandbox: &SandboxSummary) -> PollResult<Credentials> {
        self.by_username
            .get(&sandbox.username)
            .cloned()
            .ok_or_else(|| PollError::Credential {
                username: sandbox.username.clone(),
                reason: "no credentials configured".to_string(),
            })
    }
}
