//! Attack data model (§3 of the control-plane design).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use target_adapters::db::LockKind;
use uuid::Uuid;

/// The category of fault a single attack injects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    DbPool,
    LongTransaction,
    EnvVar,
    ApiCrash,
    RateLimit,
    Migration,
}

impl AttackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttackKind::DbPool => "db_pool",
            AttackKind::LongTransaction => "long_transaction",
            AttackKind::EnvVar => "env_var",
            AttackKind::ApiCrash => "api_crash",
            AttackKind::RateLimit => "rate_limit",
            AttackKind::Migration => "migration",
        }
    }

    pub fn from_path_segment(segment: &str) -> Option<Self> {
        match segment {
            "db_pool" => Some(AttackKind::DbPool),
            "long_transactions" | "long_transaction" => Some(AttackKind::LongTransaction),
            "env_vars" | "env_var" => Some(AttackKind::EnvVar),
            "api_crash" => Some(AttackKind::ApiCrash),
            "rate_limit" => Some(AttackKind::RateLimit),
            "migration" => Some(AttackKind::Migration),
            _ => None,
        }
    }

    /// Rate-limit floods run to completion by request count, not by a
    /// duration bound or an external stop — the only self-terminating kind
    /// (§4.1 state machine edge: `running -> completed`).
    pub fn is_self_terminating(&self) -> bool {
        matches!(self, AttackKind::RateLimit)
    }
}

/// The attack lifecycle state machine (§4.1). Terminal states are
/// `RolledBack`, `Completed`, `Failed`, `RollbackFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackState {
    Starting,
    Running,
    Cancelling,
    RolledBack,
    Completed,
    Failed,
    RollbackFailed,
}

impl AttackState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttackState::RolledBack
                | AttackState::Completed
                | AttackState::Failed
                | AttackState::RollbackFailed
        )
    }
}

/// Kind-specific, bounds-checked parameters. Constructors validate bounds
/// and return `Err` describing the violated bound; nothing partially
/// constructs (§8: "a create that fails validation performs no side
/// effects and allocates no id").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FaultParams {
    DbPool(DbPoolParams),
    LongTransaction(LongTransactionParams),
    EnvVar(EnvVarParams),
    ApiCrash(ApiCrashParams),
    RateLimit(RateLimitParams),
    Migration(MigrationParams),
}

impl FaultParams {
    pub fn kind(&self) -> AttackKind {
        match self {
            FaultParams::DbPool(_) => AttackKind::DbPool,
            FaultParams::LongTransaction(_) => AttackKind::LongTransaction,
            FaultParams::EnvVar(_) => AttackKind::EnvVar,
            FaultParams::ApiCrash(_) => AttackKind::ApiCrash,
            FaultParams::RateLimit(_) => AttackKind::RateLimit,
            FaultParams::Migration(_) => AttackKind::Migration,
        }
    }

    /// The optional bound that arms the rollback timer (§3, §4.1).
    pub fn duration_seconds(&self) -> Option<u64> {
        match self {
            FaultParams::DbPool(p) => Some(p.hold_seconds),
            FaultParams::LongTransaction(p) => p.duration_seconds,
            FaultParams::EnvVar(p) => p.duration_seconds,
            FaultParams::ApiCrash(p) => p.duration_seconds,
            FaultParams::RateLimit(_) => None,
            FaultParams::Migration(p) => p.duration_seconds,
        }
    }

    /// The shared target primitive this attack claims exclusively, used to
    /// reject `create` when a mutually destructive attack is already
    /// running against the same primitive (§5).
    pub fn target_claim(&self) -> String {
        match self {
            FaultParams::DbPool(_) => "db:pool".to_string(),
            FaultParams::LongTransaction(p) => format!("db:table:{}", p.target_table),
            FaultParams::EnvVar(p) => format!("container:api:{}", p.env_var_name),
            FaultParams::ApiCrash(_) => "container:api".to_string(),
            FaultParams::RateLimit(p) => format!("http:endpoint:{}", p.target_endpoint),
            FaultParams::Migration(_) => "db:migration_version".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbPoolParams {
    pub connections: u32,
    pub hold_seconds: u64,
    /// If `true`, additionally flood the target's `hold` endpoint instead of
    /// (or alongside) opening direct connections.
    #[serde(default)]
    pub use_hold_endpoint: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LongTransactionParams {
    pub lock_type: LockKind,
    pub target_table: String,
    #[serde(default = "default_lock_count")]
    pub lock_count: u32,
    pub duration_seconds: Option<u64>,
}

fn default_lock_count() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvFailureType {
    Missing,
    Wrong,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVarParams {
    pub env_var_name: String,
    pub failure_type: EnvFailureType,
    pub duration_seconds: Option<u64>,
    /// Endpoint probed to confirm the expected failure appears.
    pub probe_path: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiCrashMode {
    Stop,
    Restart,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiCrashParams {
    pub mode: ApiCrashMode,
    pub duration_seconds: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitParams {
    pub max_requests: u32,
    pub window_seconds: u64,
    pub flood_requests: u32,
    pub flood_rate: u32,
    pub target_endpoint: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationCorruption {
    InvalidToken,
    NoRow,
    FutureToken,
    OlderToken,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationParams {
    pub corruption: MigrationCorruption,
    pub duration_seconds: Option<u64>,
}

/// A single fault injection in flight or terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttackRecord {
    pub id: Uuid,
    pub kind: AttackKind,
    pub params: FaultParams,
    pub state: AttackState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<u64>,
    /// Kind-specific details observable to operators, merged in by
    /// `inject`'s initial result and successive `observe` probes.
    pub result: serde_json::Value,
    pub error: Option<String>,
    /// Populated only when `state == RollbackFailed`; human-readable
    /// descriptors of handles that could not be released.
    pub stranded_resources: Vec<String>,
}

impl AttackRecord {
    pub fn new(id: Uuid, params: FaultParams) -> Self {
        let kind = params.kind();
        let duration_seconds = params.duration_seconds();
        Self {
            id,
            kind,
            params,
            state: AttackState::Starting,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            duration_seconds,
            result: serde_json::json!({}),
            error: None,
            stranded_resources: Vec::new(),
        }
    }
}

/// Planned side effects returned by a dry-run, without executing them
/// (§4.3 Safety & Policy Gate).
#[derive(Debug, Clone, Serialize)]
pub struct DryRunPlan {
    pub kind: AttackKind,
    pub planned_steps: Vec<String>,
    pub risk_level: String,
    pub estimated_duration_seconds: Option<u64>,
}

/// Reasons `create` can reject a request, surfaced in the HTTP error body's
/// `detail` field.
#[derive(Debug, Clone, Serialize)]
pub struct RejectionDetail {
    pub reason: String,
    pub caps: Option<HashMap<String, usize>>,
}
