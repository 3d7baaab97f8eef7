//! Chaos service: the Fault Injection & Lifecycle Engine's HTTP transport.
//!
//! A thin actix-web layer over `chaos-engine`; all the lifecycle and safety
//! logic lives there so it can be tested without standing up this binary.

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use chaos_engine::{faults::build_modules, Registry, SafetyGate, TargetContext};
use chaos_service::middleware::RequestId;
use chaos_service::routes;
use shared::{Config, FileAuditSink};
use std::sync::Arc;
use std::time::Duration;
use target_adapters::{DockerCliContainerAdapter, LocalFileAdapter, PgDbAdapter, ReqwestHttpAdapter};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    shared::init_tracing();
    tracing::info!("starting chaos-service...");

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

    let ctx = Arc::new(TargetContext {
        container: Arc::new(DockerCliContainerAdapter::new()),
        db: Arc::new(db),
        http: Arc::new(ReqwestHttpAdapter::new().context("failed to build http client")?),
        file: Arc::new(LocalFileAdapter::new()),
        api_container: api_container.clone(),
        db_container: db_container.clone(),
        base_url: config.target.base_url.clone(),
        env_file_path: config.target.env_file_path.clone(),
    });

    let modules = build_modules(Arc::clone(&ctx));

    let safety = Arc::new(SafetyGate::new(
        config.bounds.clone(),
        config.caps.clone(),
        config.kill_switch_initial_tripped,
        vec![api_container, db_container],
    ));

    let audit = Arc::new(FileAuditSink::new(config.audit.sink_path.clone()));

    let registry = web::Data::new(Registry::new(
        safety,
        modules,
        audit,
        Duration::from_secs(config.rollback.grace_period_seconds),
    ));

    let server_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!(addr = %server_addr, "chaos-service listening");

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestId::new())
            .wrap(Logger::default())
            .app_data(registry.clone())
            .app_data(web::JsonConfig::default().limit(1_048_576))
            .configure(routes::configure)
    })
    .bind(&server_addr)
    .with_context(|| format!("failed to bind to {server_addr}"))?;

    server.run().await.context("server error")?;

    tracing::info!("chaos-service shutdown complete");
    Ok(())
}
