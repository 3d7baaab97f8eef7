//! `POST /kill` — trip the global kill switch and stop every in-flight
//! attack (spec §6, §8 property 6).

use actix_web::{web, HttpResponse};
use chaos_engine::Registry;

pub async fn kill(registry: web::Data<Registry>) -> HttpResponse {
    let cancelled_ids = registry.kill().await;
    HttpResponse::Ok().json(serde_json::json!({
        "cancelled_ids": cancelled_ids,
    }))
}
