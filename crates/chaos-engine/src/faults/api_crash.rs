//! API crash (§4.2.d): stop or restart the target's API container.

use crate::module::{FaultModule, OwnedResources, RollbackFailure, TargetContext};
use crate::types::{ApiCrashMode, AttackKind, ApiCrashParams, FaultParams};
use async_trait::async_trait;
use serde_json::json;
use shared::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use target_adapters::ContainerStatus;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

const UNREACHABLE_PROBE_WINDOW: Duration = Duration::from_secs(5);
const UNREACHABLE_PROBE_INTERVAL: Duration = Duration::from_millis(250);

pub struct ApiCrashModule {
    ctx: Arc<TargetContext>,
}

impl ApiCrashModule {
    pub fn new(ctx: Arc<TargetContext>) -> Self {
        Self { ctx }
    }
}

pub struct Owned {
    pub mode: ApiCrashMode,
}

#[async_trait]
impl FaultModule for ApiCrashModule {
    fn kind(&self) -> AttackKind {
        AttackKind::ApiCrash
    }

    async fn inject(
        &self,
        params: &FaultParams,
        _cancel: CancellationToken,
    ) -> Result<(OwnedResources, serde_json::Value)> {
        let p: &ApiCrashParams = match params {
            FaultParams::ApiCrash(p) => p,
            _ => return Err(Error::internal("api_crash module received mismatched params")),
        };

        match p.mode {
            ApiCrashMode::Stop => {
                self.ctx.container.stop(&self.ctx.api_container).await?;

                let deadline = tokio::time::Instant::now() + UNREACHABLE_PROBE_WINDOW;
                let mut confirmed_unreachable = false;
                while tokio::time::Instant::now() < deadline {
                    match self.ctx.container.status(&self.ctx.api_container).await {
                        Ok(ContainerStatus::Stopped) => {
                            confirmed_unreachable = true;
                            break;
                        }
                        _ => sleep(UNREACHABLE_PROBE_INTERVAL).await,
                    }
                }

                Ok((
                    OwnedResources::ApiCrash(Owned { mode: p.mode }),
                    json!({ "mode": p.mode, "confirmed_unreachable": confirmed_unreachable }),
                ))
            }
            ApiCrashMode::Restart => {
                self.ctx.container.restart(&self.ctx.api_container).await?;
                Ok((
                    OwnedResources::ApiCrash(Owned { mode: p.mode }),
                    json!({ "mode": p.mode, "confirmed_unreachable": false }),
                ))
            }
        }
    }

    async fn observe(&self, owned: &OwnedResources) -> Result<serde_json::Value> {
        let _owned = match owned {
            OwnedResources::ApiCrash(o) => o,
            _ => return Err(Error::internal("api_crash observe received mismatched resources")),
        };
        let status = self.ctx.container.status(&self.ctx.api_container).await?;
        Ok(json!({ "container_status": format!("{status:?}") }))
    }

    async fn rollback(
        &self,
        owned: OwnedResources,
        _force: bool,
    ) -> std::result::Result<(), RollbackFailure> {
        let owned = match owned {
            OwnedResources::ApiCrash(o) => o,
            _ => return Err(RollbackFailure::new("mismatched resources", vec![])),
        };

        // A `restart`-mode crash already left the container running; only
        // `stop` needs an explicit start back.
        if owned.mode == ApiCrashMode::Stop {
            if let Err(e) = self.ctx.container.start(&self.ctx.api_container).await {
                return Err(RollbackFailure::new(
                    e.to_string(),
                    vec![format!("container:{}", self.ctx.api_container)],
                ));
            }
        }

        Ok(())
    }
}
