//! Append-only audit sink for control actions
//!
//! Every control action (`create`, `start`, `stop`, `kill`, a remediation
//! step, a dry-run) is recorded here. The sink is intentionally narrow and
//! mockable, in the same spirit as the adapters in `target-adapters`: tests
//! assert against an in-memory sink, production uses the file-backed one.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// A single audit entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: uuid::Uuid,
    pub timestamp: DateTime<Utc>,
    /// Always "system" today; kept as a field because authentication is an
    /// explicit out-of-scope collaborator, not a structural impossibility.
    pub actor: String,
    pub action: String,
    pub target_kind: String,
    pub target_id: String,
    pub outcome: String,
    pub detail: serde_json::Value,
}

impl AuditRecord {
    pub fn new(
        action: impl Into<String>,
        target_kind: impl Into<String>,
        target_id: impl Into<String>,
        outcome: impl Into<String>,
        detail: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            timestamp: Utc::now(),
            actor: "system".to_string(),
            action: action.into(),
            target_kind: target_kind.into(),
            target_id: target_id.into(),
            outcome: outcome.into(),
            detail,
        }
    }
}

/// Trait for audit sinks, so the engine can be tested against an in-memory
/// fake without touching the filesystem.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord);
}

/// Audit sink that appends newline-delimited JSON to a file, always also
/// logging through `tracing` so operators see audit events in the same log
/// stream as everything else.
pub struct FileAuditSink {
    path: Option<PathBuf>,
    write_lock: Mutex<()>,
}

impl FileAuditSink {
    pub fn new(path: Option<String>) -> Self {
        Self {
            path: path.map(PathBuf::from),
            write_lock: Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for FileAuditSink {
    async fn record(&self, record: AuditRecord) {
        tracing::info!(
            audit_id = %record.id,
            action = %record.action,
            target_kind = %record.target_kind,
            target_id = %record.target_id,
            outcome = %record.outcome,
            "audit"
        );

        let Some(path) = &self.path else {
            return;
        };

        let line = match serde_json::to_string(&record) {
            Ok(mut s) => {
                s.push('\n');
                s
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize audit record");
                return;
            }
        };

        // Serialize concurrent writers; tokio::fs::OpenOptions does not
        // guarantee atomic appends across tasks on its own.
        let _guard = self.write_lock.lock().await;
        match tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
        {
            Ok(mut file) => {
                if let Err(e) = file.write_all(line.as_bytes()).await {
                    tracing::error!(error = %e, path = %path.display(), "failed to write audit record");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, path = %path.display(), "failed to open audit sink file");
            }
        }
    }
}

/// In-memory audit sink for tests.
#[derive(Default)]
pub struct InMemoryAuditSink {
    records: tokio::sync::Mutex<Vec<AuditRecord>>,
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, record: AuditRecord) {
        self.records.lock().await.push(record);
    }
}

impl InMemoryAuditSink {
    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_sink_records() {
        let sink = InMemoryAuditSink::default();
        sink.record(AuditRecord::new(
            "create",
            "attack",
            "abc",
            "accepted",
            serde_json::json!({"kind": "db_pool"}),
        ))
        .await;

        let records = sink.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, "create");
        assert_eq!(records[0].target_id, "abc");
    }

    #[tokio::test]
    async fn test_file_sink_without_path_does_not_panic() {
        let sink = FileAuditSink::new(None);
        sink.record(AuditRecord::new("kill", "engine", "-", "ok", serde_json::json!(null)))
            .await;
    }
}
