//! In-memory collaborators for driving the poll engine.

use async_trait::async_trait;
use scratcher_core::{ArtifactCategory, Credentials, DiscoveredChange, SandboxSummary};
use scratcher_metadata::models::{ChangeRow, NewChange, NewSandbox, RecentChangeRow, SandboxRow};
use scratcher_metadata::{
    ChangeRepo, MetadataError, MetadataResult, MetadataStore, SandboxRepo,
};
use scratcher_poller::{
    CategoryRecord, Connector, CredentialProvider, DirectoryClient, OrgConnection, OrgIdentity,
    PollError, PollResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::Semaphore;

// =============================================================================
// Directory
// =============================================================================

/// Directory returning a fixed listing. Optionally gated so a cycle blocks
/// until the test releases it.
pub struct MockDirectory {
    listing: Mutex<Result<Vec<SandboxSummary>, String>>,
    gate: Option<Arc<Semaphore>>,
    calls: AtomicUsize,
}

impl MockDirectory {
    pub fn new(sandboxes: Vec<SandboxSummary>) -> Self {
        Self {
            listing: Mutex::new(Ok(sandboxes)),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            listing: Mutex::new(Err(reason.to_string())),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Each listing waits for one permit from the returned semaphore.
    pub fn gated(sandboxes: Vec<SandboxSummary>) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut directory = Self::new(sandboxes);
        directory.gate = Some(gate.clone());
        (directory, gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectoryClient for MockDirectory {
    async fn list_active(&self) -> PollResult<Vec<SandboxSummary>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .expect("gate closed")
                .forget();
        }
        self.listing
            .lock()
            .unwrap()
            .clone()
            .map_err(PollError::DirectoryUnavailable)
    }
}

// =============================================================================
// Credentials
// =============================================================================

/// Credentials keyed by username; unknown usernames fail.
#[derive(Default)]
pub struct MockCredentials {
    by_username: HashMap<String, Credentials>,
    delay: Option<Duration>,
}

impl MockCredentials {
    /// Every lookup sleeps for `delay` before answering.
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with(mut self, sandbox: &SandboxSummary) -> Self {
        self.by_username.insert(
            sandbox.username.clone(),
            super::fixtures::credentials_for(&sandbox.org_id),
        );
        self
    }
}

#[async_trait]
impl CredentialProvider for MockCredentials {
    async fn resolve(&self, sandbox: &SandboxSummary) -> PollResult<Credentials> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.by_username
            .get(&sandbox.username)
            .cloned()
            .ok_or_else(|| PollError::Credential {
                username: sandbox.username.clone(),
                reason: "No authorization information found".to_string(),
            })
    }
}

// =============================================================================
// Connections
// =============================================================================

/// Scripted remote state of one sandbox.
#[derive(Clone, Default)]
pub struct MockOrg {
    pub connect_error: Option<String>,
    pub connect_delay: Option<Duration>,
    pub panic_on_connect: bool,
    /// `Err` makes the ledger query fail.
    pub ledger: Option<Result<Vec<DiscoveredChange>, String>>,
    pub ledger_delay: Option<Duration>,
    pub categories: HashMap<ArtifactCategory, Result<Vec<CategoryRecord>, String>>,
}

impl MockOrg {
    pub fn with_ledger(changes: Vec<DiscoveredChange>) -> Self {
        Self {
            ledger: Some(Ok(changes)),
            ..Self::default()
        }
    }

    /// Ledger unavailable; categories answer from `categories`.
    pub fn without_ledger() -> Self {
        Self {
            ledger: Some(Err("sObject type 'SourceMember' is not supported".to_string())),
            ..Self::default()
        }
    }

    pub fn category(mut self, category: ArtifactCategory, records: Vec<CategoryRecord>) -> Self {
        self.categories.insert(category, Ok(records));
        self
    }

    pub fn failing_category(mut self, category: ArtifactCategory) -> Self {
        self.categories
            .insert(category, Err(format!("INVALID_TYPE: {category}")));
        self
    }
}

/// Shared, mutable view of one org plus a log of queries made against it.
#[derive(Clone, Default)]
pub struct MockOrgHandle {
    org: Arc<Mutex<MockOrg>>,
    ledger_limits: Arc<Mutex<Vec<usize>>>,
    category_limits: Arc<Mutex<Vec<(ArtifactCategory, usize)>>>,
}

impl MockOrgHandle {
    pub fn new(org: MockOrg) -> Self {
        Self {
            org: Arc::new(Mutex::new(org)),
            ..Self::default()
        }
    }

    pub fn set(&self, org: MockOrg) {
        *self.org.lock().unwrap() = org;
    }

    pub fn ledger_limits(&self) -> Vec<usize> {
        self.ledger_limits.lock().unwrap().clone()
    }

    pub fn category_limits(&self) -> Vec<(ArtifactCategory, usize)> {
        self.category_limits.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrgConnection for MockOrgHandle {
    async fn identity(&self) -> PollResult<OrgIdentity> {
        Ok(OrgIdentity {
            user_id: "005000000000001".to_string(),
            organization_id: "00D000000000001".to_string(),
            preferred_username: None,
        })
    }

    async fn query_ledger(&self, limit: usize) -> PollResult<Vec<DiscoveredChange>> {
        self.ledger_limits.lock().unwrap().push(limit);
        let (ledger, delay) = {
            let org = self.org.lock().unwrap();
            (org.ledger.clone(), org.ledger_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match ledger {
            Some(Ok(mut changes)) => {
                changes.truncate(limit);
                Ok(changes)
            }
            Some(Err(reason)) => Err(PollError::PrimaryDiscovery(reason)),
            None => Ok(Vec::new()),
        }
    }

    async fn query_category(
        &self,
        category: ArtifactCategory,
        limit: usize,
    ) -> PollResult<Vec<CategoryRecord>> {
        self.category_limits.lock().unwrap().push((category, limit));
        let result = self.org.lock().unwrap().categories.get(&category).cloned();
        match result {
            Some(Ok(mut records)) => {
                records.truncate(limit);
                Ok(records)
            }
            Some(Err(reason)) => Err(PollError::CategoryDiscovery { category, reason }),
            None => Ok(Vec::new()),
        }
    }
}

/// Connector handing out [`MockOrgHandle`]s keyed by org id.
#[derive(Default)]
pub struct MockConnector {
    orgs: HashMap<String, MockOrgHandle>,
}

impl MockConnector {
    pub fn with(mut self, org_id: &str, org: MockOrg) -> Self {
        self.orgs.insert(org_id.to_string(), MockOrgHandle::new(org));
        self
    }

    pub fn handle(&self, org_id: &str) -> MockOrgHandle {
        self.orgs.get(org_id).cloned().expect("unknown org")
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        sandbox: &SandboxSummary,
        _credentials: &Credentials,
    ) -> PollResult<Box<dyn OrgConnection>> {
        let handle = self
            .orgs
            .get(&sandbox.org_id)
            .cloned()
            .ok_or_else(|| PollError::Connection(format!("unknown org {}", sandbox.org_id)))?;

        let (error, delay, panic) = {
            let org = handle.org.lock().unwrap();
            (org.connect_error.clone(), org.connect_delay, org.panic_on_connect)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if panic {
            panic!("connector exploded for {}", sandbox.org_id);
        }
        if let Some(reason) = error {
            return Err(PollError::Connection(reason));
        }
        Ok(Box::new(handle))
    }
}

// =============================================================================
// Store wrapper
// =============================================================================

/// Delegates to a real store but can be told to fail writes.
pub struct FlakyStore {
    inner: Arc<dyn MetadataStore>,
    fail_record_changes: bool,
    fail_upsert: bool,
}

impl FlakyStore {
    pub fn failing_changes(inner: Arc<dyn MetadataStore>) -> Self {
        Self {
            inner,
            fail_record_changes: true,
            fail_upsert: false,
        }
    }

    pub fn failing_upsert(inner: Arc<dyn MetadataStore>) -> Self {
        Self {
            inner,
            fail_record_changes: false,
            fail_upsert: true,
        }
    }
}

#[async_trait]
impl SandboxRepo for FlakyStore {
    async fn upsert_sandbox(&self, sandbox: &NewSandbox) -> MetadataResult<i64> {
        if self.fail_upsert {
            return Err(MetadataError::Internal("disk full".to_string()));
        }
        self.inner.upsert_sandbox(sandbox).await
    }

    async fn mark_polled(&self, sandbox_id: i64, at: OffsetDateTime) -> MetadataResult<()> {
        self.inner.mark_polled(sandbox_id, at).await
    }

    async fn get_sandbox_by_org_id(&self, org_id: &str) -> MetadataResult<Option<SandboxRow>> {
        self.inner.get_sandbox_by_org_id(org_id).await
    }

    async fn list_active_sandboxes(&self) -> MetadataResult<Vec<SandboxRow>> {
        self.inner.list_active_sandboxes().await
    }
}

#[async_trait]
impl ChangeRepo for FlakyStore {
    async fn record_changes(&self, sandbox_id: i64, changes: &[NewChange]) -> MetadataResult<u64> {
        if self.fail_record_changes {
            return Err(MetadataError::Internal("disk full".to_string()));
        }
        self.inner.record_changes(sandbox_id, changes).await
    }

    async fn list_recent_changes(&self, limit: u32) -> MetadataResult<Vec<RecentChangeRow>> {
        self.inner.list_recent_changes(limit).await
    }

    async fn list_changes_for_sandbox(
        &self,
        org_id: &str,
        limit: u32,
    ) -> MetadataResult<Vec<ChangeRow>> {
        self.inner.list_changes_for_sandbox(org_id, limit).await
    }

    async fn count_changes(&self, sandbox_id: i64) -> MetadataResult<u64> {
        self.inner.count_changes(sandbox_id).await
    }
}

#[async_trait]
impl MetadataStore for FlakyStore {
    async fn migrate(&self) -> MetadataResult<()> {
        self.inner.migrate().await
    }

    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }

    async fn close(&self) {
        self.inner.close().await
    }
}
