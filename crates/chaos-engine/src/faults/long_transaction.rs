//! Long-running transactions (§4.2.b): open a dedicated connection, `BEGIN`,
//! acquire a lock on `target_table`, and hold it until rollback.

use crate::module::{FaultModule, OwnedResources, RollbackFailure, TargetContext};
use crate::types::{AttackKind, FaultParams, LongTransactionParams};
use async_trait::async_trait;
use serde_json::json;
use shared::{Error, Result};
use std::sync::Arc;
use target_adapters::db::DbHandle;
use tokio_util::sync::CancellationToken;

const BLOCKED_QUERIES_LIMIT: usize = 50;

pub struct LongTransactionModule {
    ctx: Arc<TargetContext>,
}

impl LongTransactionModule {
    pub fn new(ctx: Arc<TargetContext>) -> Self {
        Self { ctx }
    }
}

pub struct Owned {
    pub handle: DbHandle,
}

#[async_trait]
impl FaultModule for LongTransactionModule {
    fn kind(&self) -> AttackKind {
        AttackKind::LongTransaction
    }

    async fn inject(
        &self,
        params: &FaultParams,
        _cancel: CancellationToken,
    ) -> Result<(OwnedResources, serde_json::Value)> {
        let p: &LongTransactionParams = match params {
            FaultParams::LongTransaction(p) => p,
            _ => return Err(Error::internal("long_transaction module received mismatched params")),
        };

        let handle = self.ctx.db.open().await?;

        if let Err(e) = self.ctx.db.begin(&handle).await {
            let _ = self.ctx.db.rollback_and_close(handle).await;
            return Err(e);
        }

        if let Err(e) = self
            .ctx
            .db
            .acquire_lock(&handle, p.lock_type, &p.target_table, p.lock_count)
            .await
        {
            let _ = self.ctx.db.rollback_and_close(handle).await;
            return Err(e);
        }

        let result = json!({
            "backend_pid": handle.backend_pid,
            "lock_type": p.lock_type,
            "target_table": p.target_table,
            "lock_count": p.lock_count,
            "blocked_count": 0,
            "blocked_queries": [],
        });

        Ok((OwnedResources::LongTransaction(Owned { handle }), result))
    }

    async fn observe(&self, owned: &OwnedResources) -> Result<serde_json::Value> {
        let owned = match owned {
            OwnedResources::LongTransaction(o) => o,
            _ => return Err(Error::internal("long_transaction observe received mismatched resources")),
        };

        let blocked = self
            .ctx
            .db
            .blocked_queries(owned.handle.backend_pid, BLOCKED_QUERIES_LIMIT)
            .await?;

        Ok(json!({
            "backend_pid": owned.handle.backend_pid,
            "blocked_count": blocked.len(),
            "blocked_queries": blocked,
        }))
    }

    async fn rollback(
        &self,
        owned: OwnedResources,
        force: bool,
    ) -> std::result::Result<(), RollbackFailure> {
        let owned = match owned {
            OwnedResources::LongTransaction(o) => o,
            _ => return Err(RollbackFailure::new("mismatched resources", vec![])),
        };

        if force {
            return match self.ctx.db.terminate_backend(owned.handle.backend_pid).await {
                Ok(()) => Ok(()),
                Err(e) => Err(RollbackFailure::new(
                    e.to_string(),
                    vec![format!("backend_pid:{}", owned.handle.backend_pid)],
                )),
            };
        }

        match self.ctx.db.rollback_and_close(owned.handle).await {
            Ok(()) => Ok(()),
            Err(e) => Err(RollbackFailure::new(
                e.to_string(),
                vec![format!("backend_pid:{}", owned.handle.backend_pid)],
            )),
        }
    }
}
