//! Rate-limit misconfiguration (§4.2.e): tighten the target's rate limits,
//! flood the target endpoint, and verify the observed 429 count against the
//! expected count. Self-terminating: the flood runs to completion by
//! request count, not by a duration bound or an external stop.

use crate::module::{FaultModule, OwnedResources, RollbackFailure, TargetContext};
use crate::types::{AttackKind, FaultParams, RateLimitParams};
use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const ADMIN_TIMEOUT: Duration = Duration::from_secs(5);
const FLOOD_TIMEOUT: Duration = Duration::from_secs(5);
/// How far the observed rate-limited count may drop below the naive
/// expectation (`flood_requests - max_requests`) and still count as
/// verified — floods are bursty and the target's own window boundaries
/// rarely line up exactly with ours.
const VERIFICATION_TOLERANCE: i64 = 5;

pub struct RateLimitModule {
    ctx: Arc<TargetContext>,
}

impl RateLimitModule {
    pub fn new(ctx: Arc<TargetContext>) -> Self {
        Self { ctx }
    }

    fn admin_url(&self) -> String {
        format!("{}/admin/rate-limit", self.ctx.base_url)
    }
}

pub struct Owned {
    pub original_limits: Value,
}

#[async_trait]
impl FaultModule for RateLimitModule {
    fn kind(&self) -> AttackKind {
        AttackKind::RateLimit
    }

    async fn inject(
        &self,
        params: &FaultParams,
        _cancel: CancellationToken,
    ) -> Result<(OwnedResources, Value)> {
        let p: &RateLimitParams = match params {
            FaultParams::RateLimit(p) => p,
            _ => return Err(Error::internal("rate_limit module received mismatched params")),
        };

        // Back up current limits. The target's admin endpoint is expected
        // to echo its current configuration on GET and accept the same
        // shape on POST.
        let original_limits = self.ctx.http.get_json(&self.admin_url(), ADMIN_TIMEOUT).await?;

        self.ctx
            .http
            .post(
                &self.admin_url(),
                json!({ "max_requests": p.max_requests, "window_seconds": p.window_seconds }),
                ADMIN_TIMEOUT,
            )
            .await?;

        let url = format!("{}{}", self.ctx.base_url, p.target_endpoint);
        let stats = self
            .ctx
            .http
            .flood(&url, p.flood_requests, p.flood_rate, FLOOD_TIMEOUT)
            .await?;

        let expected_rate_limited = (p.flood_requests as i64 - p.max_requests as i64).max(0);
        let observed = stats.rate_limited as i64;
        let verified = observed >= expected_rate_limited - VERIFICATION_TOLERANCE;

        let result = json!({
            "target_endpoint": p.target_endpoint,
            "flood_results": stats,
            "verification": {
                "expected_rate_limited": expected_rate_limited,
                "observed_rate_limited": observed,
                "verified": verified,
            },
        });

        Ok((OwnedResources::RateLimit(Owned { original_limits }), result))
    }

    async fn observe(&self, owned: &OwnedResources) -> Result<Value> {
        let _owned = match owned {
            OwnedResources::RateLimit(o) => o,
            _ => return Err(Error::internal("rate_limit observe received mismatched resources")),
        };
        // The flood already ran to completion inside `inject`; nothing
        // further to probe while `running`.
        Ok(json!({}))
    }

    async fn rollback(
        &self,
        owned: OwnedResources,
        _force: bool,
    ) -> std::result::Result<(), RollbackFailure> {
        let owned = match owned {
            OwnedResources::RateLimit(o) => o,
            _ => return Err(RollbackFailure::new("mismatched resources", vec![])),
        };

        match self
            .ctx
            .http
            .post(&self.admin_url(), owned.original_limits.clone(), ADMIN_TIMEOUT)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => Err(RollbackFailure::new(e.to_string(), vec!["rate_limit_config".to_string()])),
        }
    }
}
