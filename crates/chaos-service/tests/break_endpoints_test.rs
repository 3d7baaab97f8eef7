//! Integration tests for the chaos-service HTTP surface (spec §6), driven
//! against fake adapters so no Docker daemon, Postgres, or target process is
//! required.

use actix_web::{test, web, App};
use chaos_engine::faults::build_modules;
use chaos_engine::{Registry, SafetyGate, TargetContext};
use chaos_service::middleware::RequestId;
use chaos_service::routes;
use serde_json::Value;
use shared::config::{BoundsConfig, CapsConfig};
use shared::InMemoryAuditSink;
use std::sync::Arc;
use std::time::Duration;
use target_adapters::fakes::{FakeContainerAdapter, FakeDbAdapter, FakeFileAdapter, FakeHttpAdapter};

fn test_registry() -> web::Data<Registry> {
    let ctx = Arc::new(TargetContext {
        container: Arc::new(FakeContainerAdapter::new()),
        db: Arc::new(FakeDbAdapter::new()),
        http: Arc::new(FakeHttpAdapter::new()),
        file: Arc::new(FakeFileAdapter::new()),
        api_container: "target-api".to_string(),
        db_container: "target-db".to_string(),
        base_url: "http://target".to_string(),
        env_file_path: "/env".to_string(),
    });
    let modules = build_modules(Arc::clone(&ctx));
    let safety = Arc::new(SafetyGate::new(
        BoundsConfig::default(),
        CapsConfig::default(),
        false,
        vec![],
    ));
    web::Data::new(Registry::new(
        safety,
        modules,
        Arc::new(InMemoryAuditSink::default()),
        Duration::from_secs(2),
    ))
}

#[actix_web::test]
async fn test_health_check_reports_kill_switch_state() {
    let registry = test_registry();
    let app = test::init_service(
        App::new()
            .wrap(RequestId::new())
            .app_data(registry.clone())
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["kill_switch_tripped"], false);
}

#[actix_web::test]
async fn test_unknown_kind_returns_404() {
    let registry = test_registry();
    let app = test::init_service(
        App::new().app_data(registry.clone()).configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::post().uri("/break/not_a_kind").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_invalid_params_returns_400() {
    let registry = test_registry();
    let app = test::init_service(
        App::new().app_data(registry.clone()).configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/break/db_pool")
        .set_json(serde_json::json!({"connections": 0, "hold_seconds": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "invalid_params");
}

#[actix_web::test]
async fn test_break_then_status_then_stop_reaches_rolled_back() {
    let registry = test_registry();
    let app = test::init_service(
        App::new().app_data(registry.clone()).configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/break/db_pool")
        .set_json(serde_json::json!({"connections": 2, "hold_seconds": 5}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 202);
    let created: Value = test::read_body_json(resp).await;
    let attack_id = created["attack_id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri(&format!("/break/db_pool/{attack_id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::post()
        .uri(&format!("/break/db_pool/{attack_id}/stop?force=true"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let stopped: Value = test::read_body_json(resp).await;
    assert_eq!(stopped["state"], "rolled_back");
}

#[actix_web::test]
async fn test_status_for_unknown_id_returns_404() {
    let registry = test_registry();
    let app = test::init_service(
        App::new().app_data(registry.clone()).configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::get()
        .uri(&format!("/break/db_pool/{}", uuid::Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_dry_run_returns_plan_without_allocating_an_attack() {
    let registry = test_registry();
    let app = test::init_service(
        App::new().app_data(registry.clone()).configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/break/db_pool?dry_run=true")
        .set_json(serde_json::json!({"connections": 2, "hold_seconds": 5}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "db_pool");
    assert!(!body["planned_steps"].as_array().unwrap().is_empty());
    assert_eq!(registry.list().await.len(), 0);
}

#[actix_web::test]
async fn test_kill_trips_switch_and_rejects_further_creates() {
    let registry = test_registry();
    let app = test::init_service(
        App::new().app_data(registry.clone()).configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::post().uri("/kill").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::post()
        .uri("/break/db_pool")
        .set_json(serde_json::json!({"connections": 2, "hold_seconds": 5}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
}
