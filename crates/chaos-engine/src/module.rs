//! The uniform fault module contract (§4.2) and the shared target context
//! every fault module drives.

use crate::faults::{
    api_crash, db_pool, env_var, long_transaction, migration, rate_limit,
};
use crate::types::{AttackKind, FaultParams};
use async_trait::async_trait;
use serde_json::Value;
use shared::Result;
use std::sync::Arc;
use target_adapters::{ContainerAdapter, DbAdapter, FileAdapter, HttpAdapter};
use tokio_util::sync::CancellationToken;

/// Adapters and target identifiers every fault module needs. Built once at
/// service startup and shared (via `Arc`) across all attacks.
pub struct TargetContext {
    pub container: Arc<dyn ContainerAdapter>,
    pub db: Arc<dyn DbAdapter>,
    pub http: Arc<dyn HttpAdapter>,
    pub file: Arc<dyn FileAdapter>,
    pub api_container: String,
    pub db_container: String,
    pub base_url: String,
    pub env_file_path: String,
}

/// A rollback that did not complete cleanly; the resources named in
/// `stranded` are recorded on the attack record for human intervention
/// (§3 invariant: "owned_resources is empty in every terminal state").
#[derive(Debug, Clone)]
pub struct RollbackFailure {
    pub message: String,
    pub stranded: Vec<String>,
}

impl RollbackFailure {
    pub fn new(message: impl Into<String>, stranded: Vec<String>) -> Self {
        Self {
            message: message.into(),
            stranded,
        }
    }
}

/// Resources a running attack must release on rollback. Opaque to the
/// registry; only the owning fault module interprets its variant.
pub enum OwnedResources {
    DbPool(db_pool::Owned),
    LongTransaction(long_transaction::Owned),
    EnvVar(env_var::Owned),
    ApiCrash(api_crash::Owned),
    RateLimit(rate_limit::Owned),
    Migration(migration::Owned),
}

/// `inject / observe / rollback` — implemented once per fault kind (§4.2).
#[async_trait]
pub trait FaultModule: Send + Sync {
    fn kind(&self) -> AttackKind;

    /// Acquire resources and produce the attack's initial observable
    /// result. Implementations must release anything they acquired before
    /// returning `Err` — the engine does not call `rollback` after a
    /// failed `inject` (§9 Open Questions: a crashed inject surfaces to the
    /// operator as `failed` rather than re-queuing or leaking resources).
    async fn inject(
        &self,
        params: &FaultParams,
        cancel: CancellationToken,
    ) -> Result<(OwnedResources, Value)>;

    /// Bounded, best-effort probe of the attack's current effect.
    async fn observe(&self, owned: &OwnedResources) -> Result<Value>;

    /// Release `owned`. `force` escalates to hard termination where the
    /// module supports it (e.g. `pg_terminate_backend` instead of a
    /// graceful `ROLLBACK`).
    async fn rollback(
        &self,
        owned: OwnedResources,
        force: bool,
    ) -> std::result::Result<(), RollbackFailure>;
}
