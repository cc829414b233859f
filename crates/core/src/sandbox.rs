//! Sandbox (scratch org) identities, credentials, and discovered changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::{Date, OffsetDateTime};

/// Lifecycle status reported by the directory authority.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SandboxStatus {
    /// Sandbox is live and should be polled.
    Active,
    /// Sandbox was deleted by its owner.
    Deleted,
    /// Sandbox reached its expiration date.
    Expired,
    /// Any other status string the directory reports.
    Other(String),
}

impl SandboxStatus {
    /// Parse a directory status string. Known values match case-insensitively;
    /// anything else is preserved verbatim.
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("active") {
            Self::Active
        } else if trimmed.eq_ignore_ascii_case("deleted") {
            Self::Deleted
        } else if trimmed.eq_ignore_ascii_case("expired") {
            Self::Expired
        } else {
            Self::Other(trimmed.to_string())
        }
    }

    /// Canonical stored form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "Active",
            Self::Deleted => "Deleted",
            Self::Expired => "Expired",
            Self::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for SandboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for SandboxStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SandboxStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::parse(&s))
    }
}

/// One entry of the directory authority's active-sandbox listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SandboxSummary {
    /// Directory record id (the listing row, not the sandbox itself).
    pub record_id: String,
    /// External sandbox identity; globally unique and immutable.
    pub org_id: String,
    /// Display name.
    pub org_name: Option<String>,
    /// Login username used to resolve credentials.
    pub username: String,
    pub status: SandboxStatus,
    pub created_date: Option<OffsetDateTime>,
    pub expiration_date: Option<Date>,
}

/// Short-lived access credentials for one sandbox.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    /// Endpoint (instance URL) the token is valid for.
    pub instance_url: String,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, instance_url: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            instance_url: instance_url.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("instance_url", &self.instance_url)
            .finish()
    }
}

/// A change observed in a sandbox, not yet bound to a stored sandbox row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredChange {
    /// Ledger change identifier. `None` when discovered through a category query.
    pub change_id: Option<String>,
    /// Artifact type, e.g. `ApexClass`.
    pub member_type: String,
    /// Artifact name.
    pub member_name: String,
    pub revision_num: i32,
    pub changed_by: Option<String>,
    pub last_modified_date: OffsetDateTime,
}

/// Artifact categories queried individually when the change ledger is unavailable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactCategory {
    ApexClass,
    ApexTrigger,
    ApexPage,
    ApexComponent,
}

impl ArtifactCategory {
    /// The fixed set of trackable categories, in query order.
    pub const ALL: [ArtifactCategory; 4] = [
        Self::ApexClass,
        Self::ApexTrigger,
        Self::ApexPage,
        Self::ApexComponent,
    ];

    /// Remote object (and member type) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApexClass => "ApexClass",
            Self::ApexTrigger => "ApexTrigger",
            Self::ApexPage => "ApexPage",
            Self::ApexComponent => "ApexComponent",
        }
    }
}

impl fmt::Display for ArtifactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactCategory {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| crate::Error::UnknownCategory(s.to_string()))
    }
}
