//! Application state shared across handlers.

use scratcher_core::config::AppConfig;
use scratcher_metadata::MetadataStore;
use scratcher_poller::Scheduler;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Change store, shared with the poll engine.
    pub metadata: Arc<dyn MetadataStore>,
    /// Poll scheduler for on-demand triggers.
    pub scheduler: Scheduler,
}

impl AppState {
    pub fn new(config: AppConfig, metadata: Arc<dyn MetadataStore>, scheduler: Scheduler) -> Self {
        if config.server.api_key.is_none() {
            tracing::warn!("No server.api_key configured, every /api request will be rejected");
        }

        Self {
            config: Arc::new(config),
            metadata,
            scheduler,
        }
    }
}
