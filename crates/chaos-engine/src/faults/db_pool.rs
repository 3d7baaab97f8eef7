//! DB pool exhaustion (§4.2.a): open N dedicated connections and/or flood a
//! `hold` endpoint that occupies a pooled connection for `hold_seconds`.

use crate::module::{FaultModule, OwnedResources, RollbackFailure, TargetContext};
use crate::types::{AttackKind, DbPoolParams, FaultParams};
use async_trait::async_trait;
use serde_json::json;
use shared::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use target_adapters::db::DbHandle;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

pub struct DbPoolModule {
    ctx: Arc<TargetContext>,
}

impl DbPoolModule {
    pub fn new(ctx: Arc<TargetContext>) -> Self {
        Self { ctx }
    }
}

/// Direct connections are held open; hold-endpoint requests run as
/// cancellable background tasks that decrement `active_holds` as they
/// complete.
pub struct Owned {
    pub handles: Vec<DbHandle>,
    pub active_holds: Arc<AtomicU32>,
    pub hold_cancel: CancellationToken,
    pub hold_tasks: JoinSet<()>,
}

#[async_trait]
impl FaultModule for DbPoolModule {
    fn kind(&self) -> AttackKind {
        AttackKind::DbPool
    }

    async fn inject(
        &self,
        params: &FaultParams,
        _cancel: CancellationToken,
    ) -> Result<(OwnedResources, serde_json::Value)> {
        let p: &DbPoolParams = match params {
            FaultParams::DbPool(p) => p,
            _ => return Err(Error::internal("db_pool module received mismatched params")),
        };

        let mut handles = Vec::with_capacity(p.connections as usize);
        for _ in 0..p.connections {
            match self.ctx.db.open().await {
                Ok(h) => handles.push(h),
                Err(e) => {
                    for h in handles.drain(..) {
                        let _ = self.ctx.db.rollback_and_close(h).await;
                    }
                    return Err(e);
                }
            }
        }

        let active_holds = Arc::new(AtomicU32::new(0));
        let hold_cancel = CancellationToken::new();
        let mut hold_tasks = JoinSet::new();

        if p.use_hold_endpoint {
            let hold_url = format!("{}/api/v1/hold", self.ctx.base_url);
            let hold_seconds = p.hold_seconds;
            for _ in 0..p.connections {
                let http = Arc::clone(&self.ctx.http);
                let url = hold_url.clone();
                let counter = Arc::clone(&active_holds);
                let token = hold_cancel.clone();
                counter.fetch_add(1, Ordering::SeqCst);
                hold_tasks.spawn(async move {
                    tokio::select! {
                        _ = token.cancelled() => {}
                        _ = http.post(&url, json!({"hold_seconds": hold_seconds}), Duration::from_secs(hold_seconds + 5)) => {}
                    }
                    counter.fetch_sub(1, Ordering::SeqCst);
                });
            }
        }

        let result = json!({
            "connections_opened": handles.len(),
            "hold_endpoint_used": p.use_hold_endpoint,
            "active_holds": active_holds.load(Ordering::SeqCst),
        });

        Ok((
            OwnedResources::DbPool(Owned {
                handles,
                active_holds,
                hold_cancel,
                hold_tasks,
            }),
            result,
        ))
    }

    async fn observe(&self, owned: &OwnedResources) -> Result<serde_json::Value> {
        let owned = match owned {
            OwnedResources::DbPool(o) => o,
            _ => return Err(Error::internal("db_pool observe received mismatched resources")),
        };
        let checked_out = self.ctx.db.checked_out_connections().await.unwrap_or(0);
        Ok(json!({
            "connections_opened": owned.handles.len(),
            "active_holds": owned.active_holds.load(Ordering::SeqCst),
            "target_checked_out_connections": checked_out,
        }))
    }

    async fn rollback(
        &self,
        owned: OwnedResources,
        _force: bool,
    ) -> std::result::Result<(), RollbackFailure> {
        let mut owned = match owned {
            OwnedResources::DbPool(o) => o,
            _ => return Err(RollbackFailure::new("mismatched resources", vec![])),
        };

        owned.hold_cancel.cancel();
        while owned.hold_tasks.join_next().await.is_some() {}

        let mut stranded = Vec::new();
        for handle in owned.handles {
            if let Err(e) = self.ctx.db.rollback_and_close(handle).await {
                tracing::warn!(error = %e, handle = handle.id, "failed to close db_pool connection");
                stranded.push(format!("db_handle:{}", handle.id));
            }
        }

        if stranded.is_empty() {
            Ok(())
        } else {
            Err(RollbackFailure::new("failed to close some held connections", stranded))
        }
    }
}
