//! In-memory fakes for every adapter trait, used by `chaos-engine` and
//! `action-service` unit tests. Each fake records the calls made to it so
//! tests can assert adapter invocations happened, and in the right order
//! (§9 Design Notes: "adapters are narrow and mockable").

use crate::container::{ContainerAdapter, ContainerStatus};
use crate::db::{BlockedQuery, DbAdapter, DbHandle, LockKind};
use crate::file::FileAdapter;
use crate::http::{FloodStats, HttpAdapter, ResponseClass};
use async_trait::async_trait;
use shared::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Records every call made against a fake adapter, in order.
#[derive(Default)]
pub struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    pub fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Fake container adapter; all containers start `Running` unless seeded
/// otherwise.
#[derive(Default)]
pub struct FakeContainerAdapter {
    pub log: CallLog,
    states: Mutex<HashMap<String, ContainerStatus>>,
    pub fail_on: Mutex<Option<String>>,
}

impl FakeContainerAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_status(&self, name: &str, status: ContainerStatus) {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), status);
    }

    fn maybe_fail(&self, op: &str) -> Result<()> {
        let fail_on = self.fail_on.lock().unwrap_or_else(|e| e.into_inner());
        if fail_on.as_deref() == Some(op) {
            return Err(Error::adapter("container", format!("forced failure on {op}")));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerAdapter for FakeContainerAdapter {
    async fn stop(&self, name: &str) -> Result<()> {
        self.log.push(format!("stop:{name}"));
        self.maybe_fail("stop")?;
        self.seed_status(name, ContainerStatus::Stopped);
        Ok(())
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.log.push(format!("start:{name}"));
        self.maybe_fail("start")?;
        self.seed_status(name, ContainerStatus::Running);
        Ok(())
    }

    async fn restart(&self, name: &str) -> Result<()> {
        self.log.push(format!("restart:{name}"));
        self.maybe_fail("restart")?;
        self.seed_status(name, ContainerStatus::Running);
        Ok(())
    }

    async fn status(&self, name: &str) -> Result<ContainerStatus> {
        self.log.push(format!("status:{name}"));
        Ok(self
            .states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .unwrap_or(ContainerStatus::Running))
    }
}

/// Fake DB adapter; tracks open dedicated handles and a single migration
/// version slot.
pub struct FakeDbAdapter {
    pub log: CallLog,
    next_id: AtomicU64,
    next_pid: AtomicI32,
    open_handles: Mutex<HashMap<u64, ()>>,
    migration_version: Mutex<Option<String>>,
    pub blocked: Mutex<Vec<BlockedQuery>>,
    pub checked_out: Mutex<u32>,
}

impl Default for FakeDbAdapter {
    fn default() -> Self {
        Self {
            log: CallLog::default(),
            next_id: AtomicU64::new(1),
            next_pid: AtomicI32::new(1000),
            open_handles: Mutex::new(HashMap::new()),
            migration_version: Mutex::new(Some("20240101000000".to_string())),
            blocked: Mutex::new(Vec::new()),
            checked_out: Mutex::new(0),
        }
    }
}

impl FakeDbAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_handle_count(&self) -> usize {
        self.open_handles.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl DbAdapter for FakeDbAdapter {
    async fn open(&self) -> Result<DbHandle> {
        self.log.push("open");
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let backend_pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.open_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, ());
        Ok(DbHandle { id, backend_pid })
    }

    async fn begin(&self, handle: &DbHandle) -> Result<()> {
        self.log.push(format!("begin:{}", handle.id));
        Ok(())
    }

    async fn acquire_lock(
        &self,
        handle: &DbHandle,
        kind: LockKind,
        target_table: &str,
        lock_count: u32,
    ) -> Result<()> {
        self.log.push(format!(
            "acquire_lock:{}:{kind:?}:{target_table}:{lock_count}",
            handle.id
        ));
        Ok(())
    }

    async fn rollback_and_close(&self, handle: DbHandle) -> Result<()> {
        self.log.push(format!("rollback_and_close:{}", handle.id));
        self.open_handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&handle.id);
        Ok(())
    }

    async fn terminate_backend(&self, pid: i32) -> Result<()> {
        self.log.push(format!("terminate_backend:{pid}"));
        Ok(())
    }

    async fn blocked_queries(&self, pid: i32, limit: usize) -> Result<Vec<BlockedQuery>> {
        self.log.push(format!("blocked_queries:{pid}:{limit}"));
        let queries = self.blocked.lock().unwrap_or_else(|e| e.into_inner());
        Ok(queries.iter().take(limit).cloned().collect())
    }

    async fn checked_out_connections(&self) -> Result<u32> {
        self.log.push("checked_out_connections");
        Ok(*self.checked_out.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn read_migration_version(&self) -> Result<Option<String>> {
        self.log.push("read_migration_version");
        Ok(self.migration_version.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn write_migration_version(&self, value: Option<&str>) -> Result<()> {
        self.log.push(format!("write_migration_version:{value:?}"));
        *self.migration_version.lock().unwrap_or_else(|e| e.into_inner()) = value.map(String::from);
        Ok(())
    }
}

/// Fake HTTP adapter: classifies every call as `Success` unless configured
/// otherwise.
pub struct FakeHttpAdapter {
    pub log: CallLog,
    pub next_class: Mutex<ResponseClass>,
    pub flood_stats: Mutex<Option<FloodStats>>,
    pub next_json: Mutex<serde_json::Value>,
}

impl Default for FakeHttpAdapter {
    fn default() -> Self {
        Self {
            log: CallLog::default(),
            next_class: Mutex::new(ResponseClass::Success),
            flood_stats: Mutex::new(None),
            next_json: Mutex::new(serde_json::json!({})),
        }
    }
}

impl FakeHttpAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_next_class(&self, class: ResponseClass) {
        *self.next_class.lock().unwrap_or_else(|e| e.into_inner()) = class;
    }

    pub fn set_next_json(&self, value: serde_json::Value) {
        *self.next_json.lock().unwrap_or_else(|e| e.into_inner()) = value;
    }
}

#[async_trait]
impl HttpAdapter for FakeHttpAdapter {
    async fn get(&self, url: &str, _timeout: Duration) -> Result<ResponseClass> {
        self.log.push(format!("get:{url}"));
        Ok(*self.next_class.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn get_json(&self, url: &str, _timeout: Duration) -> Result<serde_json::Value> {
        self.log.push(format!("get_json:{url}"));
        Ok(self.next_json.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    async fn post(&self, url: &str, _body: serde_json::Value, _timeout: Duration) -> Result<ResponseClass> {
        self.log.push(format!("post:{url}"));
        Ok(*self.next_class.lock().unwrap_or_else(|e| e.into_inner()))
    }

    async fn flood(&self, url: &str, total: u32, rps: u32, _timeout: Duration) -> Result<FloodStats> {
        self.log.push(format!("flood:{url}:{total}:{rps}"));
        if let Some(stats) = self.flood_stats.lock().unwrap_or_else(|e| e.into_inner()).clone() {
            return Ok(stats);
        }
        let mut stats = FloodStats::default();
        stats.success = total;
        Ok(stats)
    }
}

/// Fake file adapter: an in-memory map of path -> contents, plus a
/// per-path backup slot.
#[derive(Default)]
pub struct FakeFileAdapter {
    pub log: CallLog,
    files: Mutex<HashMap<String, String>>,
    backups: Mutex<HashMap<String, String>>,
}

impl FakeFileAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, path: &str, contents: &str) {
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), contents.to_string());
    }
}

#[async_trait]
impl FileAdapter for FakeFileAdapter {
    async fn read(&self, path: &str) -> Result<String> {
        self.log.push(format!("read:{path}"));
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| Error::adapter("file", format!("{path} not found")))
    }

    async fn atomic_write(&self, path: &str, contents: &str) -> Result<()> {
        self.log.push(format!("atomic_write:{path}"));
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), contents.to_string());
        Ok(())
    }

    async fn backup_to_sibling(&self, path: &str) -> Result<String> {
        self.log.push(format!("backup_to_sibling:{path}"));
        let contents = self.read(path).await?;
        let backup_path = format!("{path}.bak");
        self.backups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(backup_path.clone(), contents);
        Ok(backup_path)
    }

    async fn restore_from_sibling(&self, path: &str, backup_path: &str) -> Result<()> {
        self.log.push(format!("restore_from_sibling:{path}:{backup_path}"));
        let contents = self
            .backups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(backup_path)
            .ok_or_else(|| Error::adapter("file", format!("no backup at {backup_path}")))?;
        self.files
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_string(), contents);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_container_records_calls_in_order() {
        let adapter = FakeContainerAdapter::new();
        adapter.stop("target-api").await.unwrap();
        adapter.start("target-api").await.unwrap();

        assert_eq!(adapter.log.calls(), vec!["stop:target-api", "start:target-api"]);
        assert_eq!(
            adapter.status("target-api").await.unwrap(),
            ContainerStatus::Running
        );
    }

    #[tokio::test]
    async fn test_fake_file_roundtrip() {
        let adapter = FakeFileAdapter::new();
        adapter.seed("/env", "KEY=1\n");

        let backup = adapter.backup_to_sibling("/env").await.unwrap();
        adapter.atomic_write("/env", "KEY=CORRUPT\n").await.unwrap();
        assert_eq!(adapter.read("/env").await.unwrap(), "KEY=CORRUPT\n");

        adapter.restore_from_sibling("/env", &backup).await.unwrap();
        assert_eq!(adapter.read("/env").await.unwrap(), "KEY=1\n");
    }

    #[tokio::test]
    async fn test_fake_db_open_and_close_tracks_handles() {
        let adapter = FakeDbAdapter::new();
        let handle = adapter.open().await.unwrap();
        assert_eq!(adapter.open_handle_count(), 1);

        adapter.rollback_and_close(handle).await.unwrap();
        assert_eq!(adapter.open_handle_count(), 0);
    }
}
