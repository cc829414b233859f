//! PostgreSQL-based change store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::{ChangeRepo, SandboxRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use scratcher_core::config::PgSslMode;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use time::OffsetDateTime;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based change store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::from_str(url)?;
        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Prepared statements hold one command each, so the schema runs piecewise.
        let mut tx = self.pool.begin().await?;
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(|e| MetadataError::Migration(e.to_string()))?;
        }
        tx.commit().await?;
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

#[async_trait]
impl SandboxRepo for PostgresStore {
    async fn upsert_sandbox(&self, sandbox: &NewSandbox) -> MetadataResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sandboxes (
                org_id, org_name, username, alias, instance_url, access_token,
                refresh_token, status, created_date, expiration_date,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            ON CONFLICT (org_id) DO UPDATE SET
                org_name = EXCLUDED.org_name,
                username = EXCLUDED.username,
                alias = EXCLUDED.alias,
                instance_url = EXCLUDED.instance_url,
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                status = EXCLUDED.status,
                expiration_date = EXCLUDED.expiration_date,
                updated_at = EXCLUDED.updated_at
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
        .bind(sandbox.created_date)
        .bind(sandbox.expiration_date)
        .bind(sandbox.observed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| MetadataError::from_write(e, "upsert sandbox"))?;
        Ok(id)
    }

    async fn mark_polled(&self, sandbox_id: i64, at: OffsetDateTime) -> MetadataResult<()> {
        let result = sqlx::query("UPDATE sandboxes SET last_polled_at = $1 WHERE id = $2")
            .bind(at)
            .bind(sandbox_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("sandbox id {sandbox_id}")));
        }
        Ok(())
    }

    async fn get_sandbox_by_org_id(&self, org_id: &str) -> MetadataResult<Option<SandboxRow>> {
        let row = sqlx::query_as::<_, SandboxRow>("SELECT * FROM sandboxes WHERE org_id = $1")
            .bind(org_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_active_sandboxes(&self) -> MetadataResult<Vec<SandboxRow>> {
        let rows = sqlx::query_as::<_, SandboxRow>(
            r#"
            SELECT * FROM sandboxes
            WHERE status = 'Active'
            ORDER BY created_date DESC NULLS LAST, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ChangeRepo for PostgresStore {
    async fn record_changes(&self, sandbox_id: i64, changes: &[NewChange]) -> MetadataResult<u64> {
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
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                ON CONFLICT (sandbox_id, change_id, member_name) DO UPDATE SET
                    member_type = EXCLUDED.member_type,
                    revision_num = EXCLUDED.revision_num,
                    changed_by = EXCLUDED.changed_by,
                    last_modified_date = EXCLUDED.last_modified_date,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(sandbox_id)
            .bind(change.change_key())
            .bind(&change.member_type)
            .bind(&change.member_name)
            .bind(change.revision_num)
            .bind(&change.changed_by)
            .bind(change.last_modified_date)
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
            LIMIT $1
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
            WHERE s.org_id = $1
            ORDER BY c.last_modified_date DESC, c.id DESC
            LIMIT $2
            "#,
        )
        .bind(org_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_changes(&self, sandbox_id: i64) -> MetadataResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM changes WHERE sandbox_id = $1")
            .bind(sandbox_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
