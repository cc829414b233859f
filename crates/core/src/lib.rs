//! Core domain types and shared logic for the scratcher change aggregator.
//!
//! This crate defines the data model used across the other crates:
//! - Sandbox (scratch org) identities, status, and directory summaries
//! - Short-lived sandbox credentials
//! - Discovered changes and the artifact categories used for fallback discovery
//! - Timestamp parsing for the remote API's date formats
//! - Application configuration

pub mod config;
pub mod error;
pub mod sandbox;
pub mod timestamp;

pub use error::{Error, Result};
pub use sandbox::{ArtifactCategory, Credentials, DiscoveredChange, SandboxStatus, SandboxSummary};

/// Default number of recent changes returned across all sandboxes.
pub const DEFAULT_RECENT_CHANGES_LIMIT: u32 = 100;

/// Default number of changes returned for a single sandbox.
pub const DEFAULT_SANDBOX_CHANGES_LIMIT: u32 = 50;

/// Upper bound on any caller-supplied read limit.
pub const MAX_READ_LIMIT: u32 = 1000;
