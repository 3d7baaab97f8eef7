//! Route configuration for the chaos service (spec §6).

use actix_web::web;

use crate::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(handlers::health::health_check))
        .route("/kill", web::post().to(handlers::kill::kill))
        .route("/break/{kind}", web::post().to(handlers::break_attack::create_and_start))
        .route("/break/{kind}/{id}", web::get().to(handlers::break_attack::status))
        .route("/break/{kind}/{id}/stop", web::post().to(handlers::break_attack::stop));
}
