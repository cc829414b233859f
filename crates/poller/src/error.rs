//! Poll engine error types.

use scratcher_core::ArtifactCategory;
use scratcher_metadata::MetadataError;
use thiserror::Error;

/// Failures raised while polling sandboxes.
///
/// Only [`PollError::DirectoryUnavailable`] aborts a cycle; every other kind
/// is contained to the sandbox (or category) it occurred in.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("cannot authenticate to {username}: {reason}")]
    Credential { username: String, reason: String },

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("change ledger query failed: {0}")]
    PrimaryDiscovery(String),

    #[error("{category} query failed: {reason}")]
    CategoryDiscovery {
        category: ArtifactCategory,
        reason: String,
    },

    #[error("persistence error: {0}")]
    Persistence(#[from] MetadataError),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for poll operations.
pub type PollResult<T> = std::result::Result<T, PollError>;
