//! Action service: the Remediation Workflow Engine's HTTP transport.
//!
//! A thin actix-web layer over the atomic actions and workflow in this
//! crate (small enough not to need its own library/binary split the way
//! `chaos-engine`/`chaos-service` are split).

use actix_web::{middleware::Logger, web, App, HttpServer};
use action_service::context::ActionContext;
use action_service::middleware::RequestId;
use action_service::rate_limiter::ActionRateLimiter;
use action_service::routes;
use action_service::state::AppState;
use anyhow::Context;
use shared::Config;
use std::sync::Arc;
use target_adapters::{DockerCliContainerAdapter, PgDbAdapter, ReqwestHttpAdapter};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    shared::init_tracing();
    tracing::info!("starting action-service...");

    let config = Config::from_env().context("failed to load configuration")?;

    let db = PgDbAdapter::connect(&config.target.database_url)
        .await
        .context("failed to connect to target database")?;

    let api_container = config
        .target
        .container_name("api")
        .context("missing api container configuration")?
        .to_string();
    let db_container = config
        .target
        .container_name("db")
        .context("missing db container configuration")?
        .to_string();

    let ctx = ActionContext {
        container: Arc::new(DockerCliContainerAdapter::new()),
        db: Arc::new(db),
        http: Arc::new(ReqwestHttpAdapter::new().context("failed to build http client")?),
        api_container,
        db_container,
        base_url: config.target.base_url.clone(),
    };

    let state = web::Data::new(AppState {
        ctx,
        limiter: ActionRateLimiter::new(config.action.max_executions_per_minute),
        health_check_path: config.action.health_check_path.clone(),
        pool_capacity: config.action.pool_capacity,
    });

    let server_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %server_addr, "action-service listening");

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestId::new())
            .wrap(Logger::default())
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().limit(1_048_576))
            .configure(routes::configure)
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind to {server_addr}"))?;

    server.run().await.context("server error")?;

    tracing::info!("action-service shutdown complete");
    Ok(())
}
