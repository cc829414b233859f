//! Server test utilities.

use async_trait::async_trait;
use scratcher_core::SandboxSummary;
use scratcher_core::config::AppConfig;
use scratcher_metadata::{MetadataStore, SqliteStore};
use scratcher_poller::{
    DirectoryClient, PollOrchestrator, PollResult, RestConnector, Scheduler, StaticCredentials,
};
use scratcher_server::{AppState, create_router};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Semaphore;

pub const TEST_API_KEY: &str = "test-api-key";

/// Directory with no sandboxes whose listing blocks until a permit is
/// released, so tests control how long a cycle runs.
pub struct GatedDirectory {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl DirectoryClient for GatedDirectory {
    async fn list_active(&self) -> PollResult<Vec<SandboxSummary>> {
        self.gate
            .acquire()
            .await
            .expect("gate closed")
            .forget();
        Ok(Vec::new())
    }
}

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub gate: Arc<Semaphore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server requiring [`TEST_API_KEY`].
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let db_path = temp_dir.path().join("scratcher.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("Failed to create change store"),
        );

        let mut config = AppConfig::for_testing(db_path);
        config.server.api_key = Some(TEST_API_KEY.to_string());
        modifier(&mut config);

        let gate = Arc::new(Semaphore::new(0));
        let orchestrator = PollOrchestrator::new(
            Arc::new(GatedDirectory { gate: gate.clone() }),
            Arc::new(StaticCredentials::new()),
            Arc::new(
                RestConnector::new("59.0", Duration::from_secs(5))
                    .expect("Failed to build connector"),
            ),
            metadata.clone(),
            &config.poll,
        );
        let scheduler = Scheduler::new(
            Arc::new(orchestrator),
            config.poll.interval(),
            config.poll.run_on_startup,
        );

        let state = AppState::new(config, metadata, scheduler);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            gate,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying change store.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Let every pending and future cycle finish.
    pub fn release_cycles(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}
