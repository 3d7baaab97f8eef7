//! Health verdict: the shape the blind agent and the remediation workflow
//! both read to decide whether the target stack has recovered (§6: "Health
//! verdict (consumed by the agent and by workflows)").

use crate::context::ActionContext;
use serde::Serialize;
use std::time::{Duration, Instant};
use target_adapters::ResponseClass;

/// Point-in-time read of the target's health, independent of any chaos
/// attack bookkeeping — the agent that calls this has no knowledge of
/// chaos state (GLOSSARY: "Blind agent").
#[derive(Debug, Clone, Serialize)]
pub struct HealthVerdict {
    pub is_healthy: bool,
    pub health_status: String,
    pub database_status: String,
    pub pool_health: String,
    pub pool_utilization: f64,
    pub error_rate_percent: f64,
    pub avg_response_time_ms: f64,
}

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn verify_target_health(
    ctx: &ActionContext,
    health_check_path: &str,
    pool_capacity: u32,
) -> HealthVerdict {
    let url = format!("{}{}", ctx.base_url, health_check_path);
    let start = Instant::now();
    let probe = ctx.http.get(&url, PROBE_TIMEOUT).await;
    let avg_response_time_ms = start.elapsed().as_secs_f64() * 1000.0;

    let (health_status, error_rate_percent) = match probe {
        Ok(ResponseClass::Success) => ("healthy".to_string(), 0.0),
        Ok(ResponseClass::RateLimited) => ("degraded".to_string(), 100.0),
        Ok(ResponseClass::Error) => ("unhealthy".to_string(), 100.0),
        Err(_) => ("unreachable".to_string(), 100.0),
    };

    let (database_status, pool_utilization, pool_health) =
        match ctx.db.checked_out_connections().await {
            Ok(checked_out) => {
                let capacity = pool_capacity.max(1) as f64;
                let utilization = (checked_out as f64 / capacity * 100.0).min(100.0);
                let pool_health = if utilization < 70.0 {
                    "healthy"
                } else if utilization < 90.0 {
                    "degraded"
                } else {
                    "exhausted"
                };
                ("connected".to_string(), utilization, pool_health.to_string())
            }
            Err(_) => ("unreachable".to_string(), 100.0, "exhausted".to_string()),
        };

    let is_healthy =
        health_status == "healthy" && database_status == "connected" && pool_health != "exhausted";

    HealthVerdict {
        is_healthy,
        health_status,
        database_status,
        pool_health,
        pool_utilization,
        error_rate_percent,
        avg_response_time_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use target_adapters::fakes::{FakeContainerAdapter, FakeDbAdapter, FakeHttpAdapter};

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
    async fn test_healthy_target_reports_is_healthy() {
        let ctx = test_ctx(Arc::new(FakeDbAdapter::new()), Arc::new(FakeHttpAdapter::new()));
        let verdict = verify_target_health(&ctx, "/api/v1/health", 20).await;
        assert!(verdict.is_healthy);
        assert_eq!(verdict.health_status, "healthy");
        assert_eq!(verdict.database_status, "connected");
    }

    #[tokio::test]
    async fn test_exhausted_pool_marks_unhealthy() {
        let db = Arc::new(FakeDbAdapter::new());
        *db.checked_out.lock().unwrap() = 19;
        let ctx = test_ctx(db, Arc::new(FakeHttpAdapter::new()));
        let verdict = verify_target_health(&ctx, "/api/v1/health", 20).await;
        assert_eq!(verdict.pool_health, "exhausted");
        assert!(!verdict.is_healthy);
    }

    #[tokio::test]
    async fn test_http_error_marks_unhealthy() {
        let http = Arc::new(FakeHttpAdapter::new());
        http.set_next_class(ResponseClass::Error);
        let ctx = test_ctx(Arc::new(FakeDbAdapter::new()), http);
        let verdict = verify_target_health(&ctx, "/api/v1/health", 20).await;
        assert_eq!(verdict.health_status, "unhealthy");
        assert!(!verdict.is_healthy);
    }
}
