//! Integration tests for the action-service HTTP surface (spec §6), driven
//! against fake adapters so no Docker daemon, Postgres, or target process is
//! required.

use action_service::context::ActionContext;
use action_service::middleware::RequestId;
use action_service::rate_limiter::ActionRateLimiter;
use action_service::routes;
use action_service::state::AppState;
use actix_web::{test, web, App};
use serde_json::Value;
use std::sync::Arc;
use target_adapters::fakes::{FakeContainerAdapter, FakeDbAdapter, FakeHttpAdapter};
use target_adapters::ResponseClass;

fn test_state(http: Arc<FakeHttpAdapter>, db: Arc<FakeDbAdapter>) -> web::Data<AppState> {
    let ctx = ActionContext {
        container: Arc::new(FakeContainerAdapter::new()),
        db,
        http,
        api_container: "target-api".to_string(),
        db_container: "target-db".to_string(),
        base_url: "http://target".to_string(),
    };
    web::Data::new(AppState {
        ctx,
        limiter: ActionRateLimiter::new(10),
        health_check_path: "/api/v1/health".to_string(),
        pool_capacity: 20,
    })
}

#[actix_web::test]
async fn test_health_check_reports_target_reachable() {
    let state = test_state(Arc::new(FakeHttpAdapter::new()), Arc::new(FakeDbAdapter::new()));
    let app = test::init_service(
        App::new()
            .wrap(RequestId::new())
            .app_data(state.clone())
            .configure(routes::configure),
    )
    .await;

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["target_reachable"], true);
}

#[actix_web::test]
async fn test_restart_target_api_dry_run_returns_plan() {
    let state = test_state(Arc::new(FakeHttpAdapter::new()), Arc::new(FakeDbAdapter::new()));
    let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/action/restart-target-api?dry_run=true")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert!(body["planned_command"].is_string());
    assert!(body["action"].is_string());
}

#[actix_web::test]
async fn test_restart_target_api_executes_and_reports_success() {
    let state = test_state(Arc::new(FakeHttpAdapter::new()), Arc::new(FakeDbAdapter::new()));
    let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

    let req = test::TestRequest::post().uri("/action/restart-target-api").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "success");
}

#[actix_web::test]
async fn test_verify_target_health_reports_verdict_shape() {
    let state = test_state(Arc::new(FakeHttpAdapter::new()), Arc::new(FakeDbAdapter::new()));
    let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

    let req = test::TestRequest::get().uri("/action/verify-target-health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["is_healthy"], true);
    assert!(body["pool_utilization"].is_number());
}

#[actix_web::test]
async fn test_remediate_db_pool_exhaustion_escalates_when_unhealthy() {
    let http = Arc::new(FakeHttpAdapter::new());
    http.set_next_class(ResponseClass::Error);
    let state = test_state(http, Arc::new(FakeDbAdapter::new()));
    let app = test::init_service(App::new().app_data(state.clone()).configure(routes::configure)).await;

    let req = test::TestRequest::post()
        .uri("/action/remediate-db-pool-exhaustion?escalate_to_db_restart=true")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["remediation_complete"], false);
    assert_eq!(body["execution_log"].as_array().unwrap().len(), 4);
}
