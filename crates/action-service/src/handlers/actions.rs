//! Action-service handlers for the two atomic actions and the workflow
//! (spec §6, action service table).

use crate::actions::{self, RestartOutcome};
use crate::error_response::ApiError;
use crate::state::AppState;
use crate::workflow;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DryRunQuery {
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Deserialize)]
pub struct EscalateQuery {
    #[serde(default)]
    pub escalate_to_db_restart: bool,
}

fn outcome_response(outcome: RestartOutcome) -> HttpResponse {
    match outcome {
        RestartOutcome::Plan(plan) => HttpResponse::Ok().json(plan),
        RestartOutcome::Step(step) => HttpResponse::Ok().json(step),
    }
}

pub async fn restart_target_api(
    query: web::Query<DryRunQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let outcome = actions::restart_target_api(&state.ctx, &state.limiter, query.dry_run).await?;
    Ok(outcome_response(outcome))
}

pub async fn restart_target_db(
    query: web::Query<DryRunQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let outcome = actions::restart_target_db(&state.ctx, &state.limiter, query.dry_run).await?;
    Ok(outcome_response(outcome))
}

pub async fn remediate_db_pool_exhaustion(
    query: web::Query<EscalateQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    let run = workflow::remediate_db_pool_exhaustion(
        &state.ctx,
        &state.limiter,
        &state.health_check_path,
        state.pool_capacity,
        query.escalate_to_db_restart,
    )
    .await;
    HttpResponse::Ok().json(run)
}
