//! Change store abstraction and implementations for scratcher.
//!
//! This crate owns the persisted data model:
//! - Tracked sandboxes, one row per external org id
//! - Observed changes, unique per (sandbox, change id, artifact name)
//! - Read projections backing the HTTP API

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use postgres::PostgresStore;
pub use repos::{ChangeRepo, SandboxRepo};
pub use store::{MetadataStore, SqliteStore};

use scratcher_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a change store from configuration.
///
/// Connects and bootstraps the schema; a failure here means the store is
/// unavailable and the process should not start.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    config.validate().map_err(MetadataError::Config)?;
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        MetadataConfig::Postgres {
            url,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
        } => {
            tracing::info!("Connecting to PostgreSQL using connection URL");
            let store =
                PostgresStore::from_url(url, *ssl_mode, *max_connections, *statement_timeout_ms)
                    .await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
