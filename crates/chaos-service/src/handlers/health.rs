//! `GET /health` — service self-health, including kill-switch visibility
//! (spec §7: "Kill switch trip is visible in ... the health verdict").

use actix_web::{web, HttpResponse, Responder};
use chaos_engine::Registry;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub kill_switch_tripped: bool,
}

pub async fn health_check(registry: web::Data<Registry>) -> impl Responder {
    let kill_switch_tripped = registry.safety().kill_switch_tripped();
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        kill_switch_tripped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            kill_switch_tripped: false,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("kill_switch_tripped"));
    }
}
