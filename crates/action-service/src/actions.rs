//! Atomic remediation actions (§4.4): a single adapter call gated by a
//! per-action rolling-minute rate limit, returning a step result — or, in
//! dry-run mode, the planned command and risk without touching the target.

use crate::context::ActionContext;
use crate::rate_limiter::ActionRateLimiter;
use serde::Serialize;
use shared::{Error, Result};

pub const ACTION_RESTART_API: &str = "restart-target-api";
pub const ACTION_RESTART_DB: &str = "restart-target-db";

/// Outcome of one atomic action, recorded verbatim into a workflow's
/// `execution_log` (§4.4).
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub action: String,
    pub status: String,
    pub detail: serde_json::Value,
}

impl StepResult {
    fn success(action: &str, detail: serde_json::Value) -> Self {
        Self {
            action: action.to_string(),
            status: "success".to_string(),
            detail,
        }
    }

    fn failed(action: &str, detail: serde_json::Value) -> Self {
        Self {
            action: action.to_string(),
            status: "failed".to_string(),
            detail,
        }
    }
}

/// Planned effect of an atomic action, returned instead of executing it
/// when `dry_run=true` (§4.4: "Dry-run returns the planned command, risk
/// level, and estimated downtime for each step without side effects.").
#[derive(Debug, Clone, Serialize)]
pub struct ActionPlan {
    pub action: String,
    pub planned_command: String,
    pub risk_level: String,
    pub estimated_downtime_seconds: u64,
}

fn restart_plan(action: &str, container: &str) -> ActionPlan {
    ActionPlan {
        action: action.to_string(),
        planned_command: format!("container restart {container}"),
        risk_level: "medium".to_string(),
        estimated_downtime_seconds: 5,
    }
}

/// Check the per-action rate limit before an atomic action runs. Rejected
/// requests never reach the adapter (§7: `Rejected` is a policy denial,
/// not an adapter failure).
fn check_rate_limit(limiter: &ActionRateLimiter, action: &str) -> Result<()> {
    if limiter.check(action) {
        Ok(())
    } else {
        Err(Error::rejected(format!(
            "action '{action}' exceeded its rolling-minute execution limit"
        )))
    }
}

pub async fn restart_target_api(
    ctx: &ActionContext,
    limiter: &ActionRateLimiter,
    dry_run: bool,
) -> Result<RestartOutcome> {
    if dry_run {
        return Ok(RestartOutcome::Plan(restart_plan(ACTION_RESTART_API, &ctx.api_container)));
    }
    check_rate_limit(limiter, ACTION_RESTART_API)?;

    let step = match ctx.container.restart(&ctx.api_container).await {
        Ok(()) => StepResult::success(
            ACTION_RESTART_API,
            serde_json::json!({ "container": ctx.api_container }),
        ),
        Err(e) => StepResult::failed(
            ACTION_RESTART_API,
            serde_json::json!({ "container": ctx.api_container, "error": e.to_string() }),
        ),
    };
    Ok(RestartOutcome::Step(step))
}

pub async fn restart_target_db(
    ctx: &ActionContext,
    limiter: &ActionRateLimiter,
    dry_run: bool,
) -> Result<RestartOutcome> {
    if dry_run {
        return Ok(RestartOutcome::Plan(restart_plan(ACTION_RESTART_DB, &ctx.db_container)));
    }
    check_rate_limit(limiter, ACTION_RESTART_DB)?;

    let step = match ctx.container.restart(&ctx.db_container).await {
        Ok(()) => StepResult::success(
            ACTION_RESTART_DB,
            serde_json::json!({ "container": ctx.db_container }),
        ),
        Err(e) => StepResult::failed(
            ACTION_RESTART_DB,
            serde_json::json!({ "container": ctx.db_container, "error": e.to_string() }),
        ),
    };
    Ok(RestartOutcome::Step(step))
}

/// Either the planned effect (dry-run) or the actual step result.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum RestartOutcome {
    Plan(ActionPlan),
    Step(StepResult),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use target_adapters::fakes::{FakeContainerAdapter, FakeDbAdapter, FakeHttpAdapter};

    fn test_ctx() -> ActionContext {
        ActionContext {
            container: Arc::new(FakeContainerAdapter::new()),
            db: Arc::new(FakeDbAdapter::new()),
            http: Arc::new(FakeHttpAdapter::new()),
            api_container: "target-api".to_string(),
            db_container: "target-db".to_string(),
            base_url: "http://target".to_string(),
        }
    }

    #[tokio::test]
    async fn test_dry_run_never_touches_adapter() {
        let ctx = test_ctx();
        let limiter = ActionRateLimiter::new(10);
        let outcome = restart_target_api(&ctx, &limiter, true).await.unwrap();
        assert!(matches!(outcome, RestartOutcome::Plan(_)));
    }

    #[tokio::test]
    async fn test_restart_reports_success_step() {
        let ctx = test_ctx();
        let limiter = ActionRateLimiter::new(10);
        let outcome = restart_target_api(&ctx, &limiter, false).await.unwrap();
        match outcome {
            RestartOutcome::Step(step) => {
                assert_eq!(step.action, ACTION_RESTART_API);
                assert_eq!(step.status, "success");
            }
            _ => panic!("expected a step result"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_past_budget() {
        let ctx = test_ctx();
        let limiter = ActionRateLimiter::new(1);
        restart_target_api(&ctx, &limiter, false).await.unwrap();
        let result = restart_target_api(&ctx, &limiter, false).await;
        assert!(matches!(result, Err(Error::Rejected(_))));
    }
}
