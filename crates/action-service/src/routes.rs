//! Route configuration for the action service (spec §6, action service table).

use actix_web::web;

use crate::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health::health_check))
        .route(
            "/action/restart-target-api",
            web::post().to(handlers::actions::restart_target_api),
        )
        .route(
            "/action/restart-target-db",
            web::post().to(handlers::actions::restart_target_db),
        )
        .route(
            "/action/verify-target-health",
            web::get().to(handlers::health::verify_target_health),
        )
        .route(
            "/action/remediate-db-pool-exhaustion",
            web::post().to(handlers::actions::remediate_db_pool_exhaustion),
        );
}
