//! Health endpoints: the health verdict the agent and workflows consume
//! (`GET /action/verify-target-health`), and the service's own self-health
//! (`GET /health`).

use crate::health as verdict;
use crate::state::AppState;
use actix_web::{web, HttpResponse};
use serde::Serialize;

pub async fn verify_target_health(state: web::Data<AppState>) -> HttpResponse {
    let result = verdict::verify_target_health(
        &state.ctx,
        &state.health_check_path,
        state.pool_capacity,
    )
    .await;
    HttpResponse::Ok().json(result)
}

#[derive(Debug, Serialize)]
struct ServiceHealthResponse {
    status: String,
    version: String,
    target_reachable: bool,
}

/// Service self-health: reports whether the target stack is reachable, the
/// way the source stack's `handlers::health::health_check` reports database
/// reachability rather than just returning a static "ok".
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let target_reachable = state.ctx.db.checked_out_connections().await.is_ok();
    let status = if target_reachable { "healthy" } else { "degraded" };

    let response = ServiceHealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        target_reachable,
    };

    if target_reachable {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
