//! Shared library for the chaos control plane's services
//!
//! This crate provides common functionality used by both `chaos-service`
//! and `action-service`:
//! - Configuration management
//! - Error handling types
//! - Logging infrastructure
//! - The append-only audit sink

pub mod audit;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use audit::{AuditRecord, AuditSink, FileAuditSink, InMemoryAuditSink};
pub use config::Config;
pub use error::{Error, Result};

/// Initialize tracing subscriber for structured logging
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "shared=debug,chaos_service=debug,chaos_engine=debug,action_service=debug,info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
