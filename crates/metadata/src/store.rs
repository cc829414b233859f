//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ChangeRepo, SandboxRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};

/// Combined change store trait.
///
/// One handle is created at startup, shared by poll cycles and API reads,
/// and closed explicitly at shutdown.
#[async_trait]
pub trait MetadataStore: SandboxRepo + ChangeRepo + Send + Sync {
    /// Create tables and indexes if they do not exist.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Close the connection pool, waiting for in-flight queries.
    async fn close(&self);
}

/// Timestamps are stored as text in SQLite, so everything is written in UTC
/// to keep lexical and chronological order identical.
pub(crate) fn utc(at: OffsetDateTime) -> OffsetDateTime {
    at.to_offset(UtcOffset::UTC)
}

/// SQLite-based change store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) a SQLite store and bootstrap its schema.
    pub async fn new(
        path: impl AsRef<Path>,
        query_timeout_secs: Option<u64>,
    ) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(query_timeout_secs.unwrap_or(5)));

        let pool = SqlitePoolOptions::new()
            // Single writer; concurrent poll tasks and API reads queue on the pool.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "SQLite change store ready");

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| MetadataError::Migration(e.to_string()))?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;

    #[async_trait]
    impl SandboxRepo for SqliteStore {
        async fn upsert_sandbox(&self, sandbox: &NewSandbox) -> MetadataResult<i64> {
            let observed_at = utc(sandbox.observed_at);
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO sandboxes (
                    org_id, org_name, username, alias, instance_url, access_token,
                    refresh_token, status, created_date, expiration_date,
                    created_at, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(org_id) DO UPDATE SET
                    org_name = excluded.org_name,
                    username = excluded.username,
                    alias = excluded.alias,
                    instance_url = excluded.instance_url,
                    access_token = excluded.access_token,
                    refresh_token = excluded.refresh_token,
                    status = excluded.status,
                    expiration_date = excluded.expiration_date,
                    updated_at = excluded.updated_at
                RETURNING id
                "#,
            )
            .bind(&sandbox.org_id)
            .bind(&sandbox.org_name)
            .bind(&sandbox.username)
            .bind(&sandbox.alias)
            .bind(&sandbox.instance_url)
            .bind(&sandbox.access_token)
            .bind(&sandbox.refresh_token)
            .bind(&sandbox.status)
            .bind(sandbox.created_date.map(utc))
            .bind(sandbox.expiration_date)
            .bind(observed_at)
            .bind(observed_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MetadataError::from_write(e, "upsert sandbox"))?;
            Ok(id)
        }

        async fn mark_polled(&self, sandbox_id: i64, at: OffsetDateTime) -> MetadataResult<()> {
            let result = sqlx::query("UPDATE sandboxes SET last_polled_at = ? WHERE id = ?")
                .bind(utc(at))
                .bind(sandbox_id)
                .execute(&self.pool)
                .await?;
            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!("sandbox id {sandbox_id}")));
            }
            Ok(())
        }

        async fn get_sandbox_by_org_id(&self, org_id: &str) -> MetadataResult<Option<SandboxRow>> {
            let row = sqlx::query_as::<_, SandboxRow>("SELECT * FROM sandboxes WHERE org_id = ?")
                .bind(org_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn list_active_sandboxes(&self) -> MetadataResult<Vec<SandboxRow>> {
            // NULL creation dates sort last, as they do in PostgreSQL.
            let rows = sqlx::query_as::<_, SandboxRow>(
                r#"
                SELECT * FROM sandboxes
                WHERE status = 'Active'
                ORDER BY created_date IS NULL, created_date DESC, id DESC
                "#,
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl ChangeRepo for SqliteStore {
        async fn record_changes(
            &self,
            sandbox_id: i64,
            changes: &[NewChange],
        ) -> MetadataResult<u64> {
            if changes.is_empty() {
                return Ok(0);
            }

            let now = OffsetDateTime::now_utc();
            let mut tx = self.pool.begin().await?;
            let mut written = 0u64;

            for change in collapse_by_key(changes) {
                let result = sqlx::query(
                    r#"
                    INSERT INTO changes (
                        sandbox_id, change_id, member_type, member_name, revision_num,
                        changed_by, last_modified_date, created_at, updated_at
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(sandbox_id, change_id, member_name) DO UPDATE SET
                        member_type = excluded.member_type,
                        revision_num = excluded.revision_num,
                        changed_by = excluded.changed_by,
                        last_modified_date = excluded.last_modified_date,
                        updated_at = excluded.updated_at
                    "#,
                )
                .bind(sandbox_id)
                .bind(change.change_key())
                .bind(&change.member_type)
                .bind(&change.member_name)
                .bind(change.revision_num)
                .bind(&change.changed_by)
                .bind(utc(change.last_modified_date))
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(|e| MetadataError::from_write(e, "record change"))?;
                written += result.rows_affected();
            }

            tx.commit().await?;
            Ok(written)
        }

        async fn list_recent_changes(&self, limit: u32) -> MetadataResult<Vec<RecentChangeRow>> {
            let rows = sqlx::query_as::<_, RecentChangeRow>(
                r#"
                SELECT
                    c.id, c.change_id, c.member_type, c.member_name, c.revision_num,
                    c.changed_by, c.last_modified_date,
                    s.org_id, s.org_name, s.alias, s.username
                FROM changes c
                JOIN sandboxes s ON c.sandbox_id = s.id
                WHERE s.status = 'Active'
                ORDER BY c.last_modified_date DESC, c.id DESC
                LIMIT ?
                "#,
            )
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn list_changes_for_sandbox(
            &self,
            org_id: &str,
            limit: u32,
        ) -> MetadataResult<Vec<ChangeRow>> {
            let rows = sqlx::query_as::<_, ChangeRow>(
                r#"
                SELECT c.* FROM changes c
                JOIN sandboxes s ON c.sandbox_id = s.id
                WHERE s.org_id = ?
                ORDER BY c.last_modified_date DESC, c.id DESC
                LIMIT ?
                "#,
            )
            .bind(org_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn count_changes(&self, sandbox_id: i64) -> MetadataResult<u64> {
            let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM changes WHERE sandbox_id = ?")
                .bind(sandbox_id)
                .fetch_one(&self.pool)
                .await?;
            Ok(count as u64)
        }
    }
}

/// SQLite schema.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sandboxes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    org_id TEXT NOT NULL UNIQUE,
    org_name TEXT,
    username TEXT NOT NULL,
    alias TEXT,
    instance_url TEXT NOT NULL,
    access_token TEXT,
    refresh_token TEXT,
    status TEXT NOT NULL DEFAULT 'Active',
    created_date TEXT,
    expiration_date TEXT,
    last_polled_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sandboxes_status ON sandboxes(status);

-- change_id is '' for changes found without a ledger so the unique key still applies
CREATE TABLE IF NOT EXISTS changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sandbox_id INTEGER NOT NULL REFERENCES sandboxes(id) ON DELETE CASCADE,
    change_id TEXT NOT NULL DEFAULT '',
    member_type TEXT NOT NULL,
    member_name TEXT NOT NULL,
    revision_num INTEGER NOT NULL DEFAULT 1,
    changed_by TEXT,
    last_modified_date TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(sandbox_id, change_id, member_name)
);
CREATE INDEX IF NOT EXISTS idx_changes_sandbox ON changes(sandbox_id);
CREATE INDEX IF NOT EXISTS idx_changes_modified ON changes(last_modified_date DESC);
"#;
