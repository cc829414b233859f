//! HTTP request handlers.

pub mod changes;
pub mod health;
pub mod poll;
pub mod sandboxes;

pub use changes::*;
pub use health::*;
pub use poll::*;
pub use sandboxes::*;

use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// `?limit=` query parameter. Kept as raw text so malformed values fall
/// back to the default instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<String>,
}

impl LimitQuery {
    /// Resolve the requested limit: missing, non-numeric or non-positive
    /// values yield `default`, anything else is capped at
    /// [`MAX_READ_LIMIT`](scratcher_core::MAX_READ_LIMIT).
    pub fn resolve(&self, default: u32) -> u32 {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map(|n| n.min(i64::from(scratcher_core::MAX_READ_LIMIT)) as u32)
            .unwrap_or(default)
    }
}

pub(crate) fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&Rfc3339).unwrap_or_else(|_| at.to_string())
}
