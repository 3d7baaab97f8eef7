//! PostgreSQL adapter: dedicated connections for long-running faults, plus
//! short-lived pooled queries for probes and migration-version corruption.
//!
//! Connections opened via [`DbAdapter::open`] are scoped to a single
//! attack's `owned_resources` (§3 of the control-plane design) — nothing
//! else touches them until rollback releases them. The handle returned by
//! `open` is an opaque id rather than a concrete `sqlx` connection type, so
//! the trait can be implemented by an in-memory fake (`fakes::FakeDbAdapter`)
//! without pulling a live Postgres into unit tests.

use async_trait::async_trait;
use shared::{Error, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, Executor, PgConnection, PgPool, Row};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;

const ADAPTER: &str = "postgres";

/// Opaque, attack-owned handle to a dedicated connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DbHandle {
    pub id: u64,
    pub backend_pid: i32,
}

/// A single blocked query observed via `pg_stat_activity`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BlockedQuery {
    pub pid: i32,
    pub query: String,
    pub wait_event_type: Option<String>,
}

/// Lock flavor for the long-running-transaction fault (§4.2.b).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    TableLock,
    RowLock,
    AdvisoryLock,
}

#[async_trait]
pub trait DbAdapter: Send + Sync {
    /// Open a dedicated connection and record its backend PID.
    async fn open(&self) -> Result<DbHandle>;

    /// `BEGIN` on a dedicated connection.
    async fn begin(&self, handle: &DbHandle) -> Result<()>;

    /// Acquire the given lock kind on `target_table`/`lock_count` rows.
    async fn acquire_lock(
        &self,
        handle: &DbHandle,
        kind: LockKind,
        target_table: &str,
        lock_count: u32,
    ) -> Result<()>;

    /// `ROLLBACK` and close a dedicated connection.
    async fn rollback_and_close(&self, handle: DbHandle) -> Result<()>;

    /// `pg_terminate_backend(pid)` via a short-lived pooled connection.
    async fn terminate_backend(&self, pid: i32) -> Result<()>;

    /// Queries currently blocked behind `pid`, capped at `limit`.
    async fn blocked_queries(&self, pid: i32, limit: usize) -> Result<Vec<BlockedQuery>>;

    /// Count of connections currently checked out of the target's own pool
    /// (used by the db-pool-exhaustion fault's rollback post-condition).
    async fn checked_out_connections(&self) -> Result<u32>;

    /// Read the current migration version token, if any row exists.
    async fn read_migration_version(&self) -> Result<Option<String>>;

    /// Write (or clear, when `value` is `None`) the migration version token.
    async fn write_migration_version(&self, value: Option<&str>) -> Result<()>;
}

/// Real PostgreSQL-backed adapter. Dedicated connections opened via `open`
/// live in `conns` until `rollback_and_close` removes them.
pub struct PgDbAdapter {
    database_url: String,
    pool: PgPool,
    /// Each dedicated connection gets its own async mutex so that holding a
    /// guard across an `.await` (required to run a query on it) only blocks
    /// callers of that one handle, not every attack's connection. The outer
    /// `std::sync::Mutex` only ever guards a map lookup/insert/remove, never
    /// an `.await`.
    conns: Mutex<HashMap<u64, Arc<AsyncMutex<PgConnection>>>>,
    next_id: AtomicU64,
}

impl PgDbAdapter {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("failed to connect pool: {e}")))?;

        Ok(Self {
            database_url: database_url.to_string(),
            pool,
            conns: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    fn conn_handle(&self, id: u64) -> Result<Arc<AsyncMutex<PgConnection>>> {
        self.conns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::internal(format!("no dedicated connection for handle {id}")))
    }

    /// Remove `id` from the table and unwrap its connection. Safe to assume
    /// sole ownership: the registry's single-writer-per-record invariant
    /// means only the owning attack's rollback ever calls this.
    fn take_conn(&self, id: u64) -> Result<PgConnection> {
        let arc = self
            .conns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .ok_or_else(|| Error::internal(format!("no dedicated connection for handle {id}")))?;
        match Arc::try_unwrap(arc) {
            Ok(mutex) => Ok(mutex.into_inner()),
            Err(_) => Err(Error::internal(format!(
                "dedicated connection for handle {id} still has other references"
            ))),
        }
    }
}

#[async_trait]
impl DbAdapter for PgDbAdapter {
    async fn open(&self) -> Result<DbHandle> {
        let mut conn = PgConnection::connect(&self.database_url)
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("failed to open connection: {e}")))?;

        let row = sqlx::query("SELECT pg_backend_pid()")
            .fetch_one(&mut conn)
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("failed to read backend pid: {e}")))?;
        let backend_pid: i32 = row.try_get(0).map_err(|e| Error::adapter(ADAPTER, e.to_string()))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.conns
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, Arc::new(AsyncMutex::new(conn)));

        Ok(DbHandle { id, backend_pid })
    }

    async fn begin(&self, handle: &DbHandle) -> Result<()> {
        let conn_arc = self.conn_handle(handle.id)?;
        let mut conn = conn_arc.lock().await;
        conn.execute("BEGIN")
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("BEGIN failed: {e}")))?;
        Ok(())
    }

    async fn acquire_lock(
        &self,
        handle: &DbHandle,
        kind: LockKind,
        target_table: &str,
        lock_count: u32,
    ) -> Result<()> {
        let sql = match kind {
            LockKind::TableLock => format!("LOCK TABLE {target_table} IN ACCESS EXCLUSIVE MODE"),
            LockKind::RowLock => {
                format!("SELECT * FROM {target_table} LIMIT {lock_count} FOR UPDATE")
            }
            LockKind::AdvisoryLock => {
                let mut stmts = String::new();
                for i in 0..lock_count {
                    stmts.push_str(&format!("SELECT pg_advisory_lock({i}); "));
                }
                stmts
            }
        };

        let conn_arc = self.conn_handle(handle.id)?;
        let mut conn = conn_arc.lock().await;
        conn.execute(sql.as_str())
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("lock acquisition failed: {e}")))?;
        Ok(())
    }

    async fn rollback_and_close(&self, handle: DbHandle) -> Result<()> {
        let mut conn = self.take_conn(handle.id)?;
        conn.execute("ROLLBACK")
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("ROLLBACK failed: {e}")))?;
        conn.close()
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("failed to close connection: {e}")))?;
        Ok(())
    }

    async fn terminate_backend(&self, pid: i32) -> Result<()> {
        sqlx::query("SELECT pg_terminate_backend($1)")
            .bind(pid)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("terminate_backend failed: {e}")))?;
        Ok(())
    }

    async fn blocked_queries(&self, pid: i32, limit: usize) -> Result<Vec<BlockedQuery>> {
        let rows = sqlx::query(
            r#"
            SELECT pid, query, wait_event_type
            FROM pg_stat_activity
            WHERE wait_event_type = 'Lock'
              AND $1 = ANY(pg_blocking_pids(pid))
            ORDER BY query_start ASC
            LIMIT $2
            "#,
        )
        .bind(pid)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::adapter(ADAPTER, format!("blocked_queries probe failed: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|r| BlockedQuery {
                pid: r.try_get("pid").unwrap_or_default(),
                query: r.try_get("query").unwrap_or_default(),
                wait_event_type: r.try_get("wait_event_type").ok(),
            })
            .collect())
    }

    async fn checked_out_connections(&self) -> Result<u32> {
        let row = sqlx::query(
            "SELECT count(*) AS n FROM pg_stat_activity WHERE state = 'active' AND pid != pg_backend_pid()",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Error::adapter(ADAPTER, format!("checked_out_connections failed: {e}")))?;
        let n: i64 = row.try_get("n").unwrap_or(0);
        Ok(n.max(0) as u32)
    }

    async fn read_migration_version(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT version FROM schema_migrations_version LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("read_migration_version failed: {e}")))?;
        Ok(row.and_then(|r| r.try_get::<String, _>("version").ok()))
    }

    async fn write_migration_version(&self, value: Option<&str>) -> Result<()> {
        match value {
            Some(v) => {
                sqlx::query(
                    r#"
                    INSERT INTO schema_migrations_version (id, version) VALUES (1, $1)
                    ON CONFLICT (id) DO UPDATE SET version = EXCLUDED.version
                    "#,
                )
                .bind(v)
                .execute(&self.pool)
                .await
                .map_err(|e| Error::adapter(ADAPTER, format!("write_migration_version failed: {e}")))?;
            }
            None => {
                sqlx::query("DELETE FROM schema_migrations_version WHERE id = 1")
                    .execute(&self.pool)
                    .await
                    .map_err(|e| Error::adapter(ADAPTER, format!("write_migration_version failed: {e}")))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_kind_equality() {
        assert_eq!(LockKind::TableLock, LockKind::TableLock);
        assert_ne!(LockKind::TableLock, LockKind::RowLock);
    }
}
