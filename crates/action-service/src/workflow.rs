//! The `remediate-db-pool-exhaustion` workflow (§4.4): an ordered plan of
//! atomic actions followed by a final health verification. Not a saga —
//! there is no compensation between steps, only observation (§9:
//! "Workflow ≠ saga ... remediation is observational").

use crate::actions::{self, RestartOutcome, StepResult, ACTION_RESTART_API, ACTION_RESTART_DB};
use crate::context::ActionContext;
use crate::health::{self, HealthVerdict};
use crate::rate_limiter::ActionRateLimiter;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RemediationRun {
    pub execution_log: Vec<StepResult>,
    pub remediation_complete: bool,
    pub recommendation: String,
}

fn verify_health_step(verdict: &HealthVerdict) -> StepResult {
    StepResult {
        action: "verify_health".to_string(),
        status: if verdict.is_healthy { "success" } else { "failed" }.to_string(),
        detail: serde_json::to_value(verdict).unwrap_or(serde_json::json!({})),
    }
}

fn recommendation_for(verdict: &HealthVerdict, escalated: bool) -> String {
    if verdict.is_healthy {
        "target recovered; no further action needed".to_string()
    } else if escalated {
        "target still unhealthy after restarting api and db; escalate to a human operator"
            .to_string()
    } else {
        "target still unhealthy after restarting api; consider escalate_to_db_restart"
            .to_string()
    }
}

/// Step 1 (stopping an in-flight chaos attack via `attack_id`) is the
/// agent's responsibility, not the engine's (§4.4: "this is invoked by the
/// agent, not by the action engine itself"); the workflow starts at the
/// restart step.
pub async fn remediate_db_pool_exhaustion(
    ctx: &ActionContext,
    limiter: &ActionRateLimiter,
    health_check_path: &str,
    pool_capacity: u32,
    escalate_to_db_restart: bool,
) -> RemediationRun {
    let mut execution_log = Vec::new();

    let restart_api_step = match actions::restart_target_api(ctx, limiter, false).await {
        Ok(RestartOutcome::Step(step)) => step,
        Ok(RestartOutcome::Plan(_)) => unreachable!("dry_run is always false here"),
        Err(e) => StepResult {
            action: ACTION_RESTART_API.to_string(),
            status: "failed".to_string(),
            detail: serde_json::json!({ "error": e.to_string() }),
        },
    };
    execution_log.push(restart_api_step);

    let mut verdict = health::verify_target_health(ctx, health_check_path, pool_capacity).await;
    execution_log.push(verify_health_step(&verdict));

    let mut escalated = false;
    if !verdict.is_healthy && escalate_to_db_restart {
        escalated = true;
        let restart_db_step = match actions::restart_target_db(ctx, limiter, false).await {
            Ok(RestartOutcome::Step(step)) => step,
            Ok(RestartOutcome::Plan(_)) => unreachable!("dry_run is always false here"),
            Err(e) => StepResult {
                action: ACTION_RESTART_DB.to_string(),
                status: "failed".to_string(),
                detail: serde_json::json!({ "error": e.to_string() }),
            },
        };
        execution_log.push(restart_db_step);

        verdict = health::verify_target_health(ctx, health_check_path, pool_capacity).await;
        execution_log.push(verify_health_step(&verdict));
    }

    RemediationRun {
        remediation_complete: verdict.is_healthy,
        recommendation: recommendation_for(&verdict, escalated),
        execution_log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use target_adapters::fakes::{FakeContainerAdapter, FakeDbAdapter, FakeHttpAdapter};
    use target_adapters::ResponseClass;

    fn test_ctx(db: Arc<FakeDbAdapter>, http: Arc<FakeHttpAdapter>) -> ActionContext {
        ActionContext {
            container: Arc::new(FakeContainerAdapter::new()),
            db,
            http,
            api_container: "target-api".to_string(),
            db_container: "target-db".to_string(),
            base_url: "http://target".to_string(),
        }
    }

    #[tokio::test]
    async fn test_terminates_early_when_api_restart_heals_target() {
        let ctx = test_ctx(Arc::new(FakeDbAdapter::new()), Arc::new(FakeHttpAdapter::new()));
        let limiter = ActionRateLimiter::new(10);

        let run = remediate_db_pool_exhaustion(&ctx, &limiter, "/api/v1/health", 20, true).await;

        assert!(run.remediation_complete);
        assert_eq!(run.execution_log.len(), 2);
        assert_eq!(run.execution_log[0].action, ACTION_RESTART_API);
        assert_eq!(run.execution_log[1].action, "verify_health");
    }

    #[tokio::test]
    async fn test_escalates_to_db_restart_when_still_unhealthy() {
        let http = Arc::new(FakeHttpAdapter::new());
        http.set_next_class(ResponseClass::Error);
        let ctx = test_ctx(Arc::new(FakeDbAdapter::new()), http);
        let limiter = ActionRateLimiter::new(10);

        let run = remediate_db_pool_exhaustion(&ctx, &limiter, "/api/v1/health", 20, true).await;

        assert_eq!(run.execution_log.len(), 4);
        assert_eq!(run.execution_log[2].action, ACTION_RESTART_DB);
        assert_eq!(run.execution_log[3].action, "verify_health");
        assert!(!run.remediation_complete);
    }

    #[tokio::test]
    async fn test_no_escalation_without_flag() {
        let http = Arc::new(FakeHttpAdapter::new());
        http.set_next_class(ResponseClass::Error);
        let ctx = test_ctx(Arc::new(FakeDbAdapter::new()), http);
        let limiter = ActionRateLimiter::new(10);

        let run = remediate_db_pool_exhaustion(&ctx, &limiter, "/api/v1/health", 20, false).await;

        assert_eq!(run.execution_log.len(), 2);
        assert!(!run.remediation_complete);
    }
}
