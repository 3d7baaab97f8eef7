//! Configuration management using environment variables

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;

/// Process-wide configuration, read once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// HTTP server bind configuration
    pub server: ServerConfig,

    /// Target stack configuration (container names, base URLs, db url, files)
    pub target: TargetConfig,

    /// Per-kind parameter bounds
    pub bounds: BoundsConfig,

    /// Concurrency caps
    pub caps: CapsConfig,

    /// Rollback timer / grace period configuration
    pub rollback: RollbackConfig,

    /// Audit sink configuration
    pub audit: AuditConfig,

    /// Initial state of the global kill switch
    pub kill_switch_initial_tripped: bool,

    /// Remediation workflow engine configuration
    pub action: ActionConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Configuration describing the target stack the engine acts against.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Base URL of the target application, used by the HTTP adapter
    pub base_url: String,

    /// Postgres connection string for the target database
    pub database_url: String,

    /// Logical role ("api", "db") -> container name, used by the container
    /// adapter and the safety gate's allowlist
    pub container_names: HashMap<String, String>,

    /// Path to the target's environment-variable file (env-var fault)
    pub env_file_path: String,

    /// Path to the docker-compose file governing the target stack
    pub compose_file_path: String,
}

impl TargetConfig {
    /// Resolve a logical container role to its concrete name.
    pub fn container_name(&self, role: &str) -> Result<&str> {
        self.container_names
            .get(role)
            .map(String::as_str)
            .ok_or_else(|| Error::config(format!("no container configured for role '{role}'")))
    }
}

/// Per-kind parameter bounds. Defaults match the hard bounds the fault
/// modules enforce; a deployment may narrow these further via environment
/// variables but the fault modules never honor a value wider than the
/// compiled-in hard bound.
#[derive(Debug, Clone, Deserialize)]
pub struct BoundsConfig {
    pub db_pool_connections_max: u32,
    pub db_pool_hold_seconds_max: u64,
    pub long_transaction_lock_count_max: u32,
    pub long_transaction_duration_seconds_max: u64,
    pub rate_limit_flood_requests_max: u32,
    pub migration_duration_seconds_max: u64,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            db_pool_connections_max: 500,
            db_pool_hold_seconds_max: 600,
            long_transaction_lock_count_max: 10_000,
            long_transaction_duration_seconds_max: 3_600,
            rate_limit_flood_requests_max: 100_000,
            migration_duration_seconds_max: 3_600,
        }
    }
}

/// Concurrency caps enforced by the safety gate.
#[derive(Debug, Clone, Deserialize)]
pub struct CapsConfig {
    pub max_global_attacks: usize,
    pub max_per_kind: usize,
}

impl Default for CapsConfig {
    fn default() -> Self {
        Self {
            max_global_attacks: 20,
            max_per_kind: 5,
        }
    }
}

/// Rollback timer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RollbackConfig {
    /// Grace period granted to a graceful stop before `force` escalation is
    /// required; also the authoritative bound used by property tests.
    pub grace_period_seconds: u64,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            grace_period_seconds: 10,
        }
    }
}

/// Audit sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Append-only destination for audit records. `None` means stdout-only
    /// (still logged via `tracing`, never entirely silent).
    pub sink_path: Option<String>,
}

/// Remediation workflow engine configuration: the rolling-window rate
/// limit applied to each atomic action, and how the health probe reads
/// the target stack.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionConfig {
    /// Maximum executions of a single atomic action per rolling minute.
    pub max_executions_per_minute: u32,

    /// Path on the target's base URL the health probe calls.
    pub health_check_path: String,

    /// Connection pool capacity used to compute pool utilization.
    pub pool_capacity: u32,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            max_executions_per_minute: 10,
            health_check_path: "/api/v1/health".to_string(),
            pool_capacity: 20,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let mut container_names = HashMap::new();
        container_names.insert(
            "api".to_string(),
            env::var("TARGET_API_CONTAINER").unwrap_or_else(|_| "target-api".to_string()),
        );
        container_names.insert(
            "db".to_string(),
            env::var("TARGET_DB_CONTAINER").unwrap_or_else(|_| "target-db".to_string()),
        );

        Ok(Self {
            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("SERVER_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|e| Error::config(format!("Invalid SERVER_PORT: {e}")))?,
            },
            target: TargetConfig {
                base_url: env::var("TARGET_BASE_URL")
                    .unwrap_or_else(|_| "http://localhost:9000".to_string()),
                database_url: env::var("TARGET_DATABASE_URL")
                    .map_err(|_| Error::config("TARGET_DATABASE_URL must be set"))?,
                container_names,
                env_file_path: env::var("TARGET_ENV_FILE")
                    .unwrap_or_else(|_| ".env.target".to_string()),
                compose_file_path: env::var("TARGET_COMPOSE_FILE")
                    .unwrap_or_else(|_| "docker-compose.yml".to_string()),
            },
            bounds: BoundsConfig::default(),
            caps: CapsConfig {
                max_global_attacks: env::var("CAPS_MAX_GLOBAL_ATTACKS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
                max_per_kind: env::var("CAPS_MAX_PER_KIND")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5),
            },
            rollback: RollbackConfig {
                grace_period_seconds: env::var("ROLLBACK_GRACE_PERIOD_SECONDS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
            },
            audit: AuditConfig {
                sink_path: env::var("AUDIT_SINK_PATH").ok(),
            },
            kill_switch_initial_tripped: env::var("KILL_SWITCH_INITIAL_TRIPPED")
                .ok()
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            action: ActionConfig {
                max_executions_per_minute: env::var("ACTION_MAX_EXECUTIONS_PER_MINUTE")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
                health_check_path: env::var("ACTION_HEALTH_CHECK_PATH")
                    .unwrap_or_else(|_| "/api/v1/health".to_string()),
                pool_capacity: env::var("ACTION_POOL_CAPACITY")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bounds() {
        let bounds = BoundsConfig::default();
        assert_eq!(bounds.db_pool_connections_max, 500);
        assert_eq!(bounds.long_transaction_lock_count_max, 10_000);
    }

    #[test]
    fn test_default_caps() {
        let caps = CapsConfig::default();
        assert_eq!(caps.max_global_attacks, 20);
        assert_eq!(caps.max_per_kind, 5);
    }

    #[test]
    fn test_default_action_config() {
        let action = ActionConfig::default();
        assert_eq!(action.max_executions_per_minute, 10);
        assert_eq!(action.pool_capacity, 20);
    }

    #[test]
    fn test_container_name_lookup() {
        let mut container_names = HashMap::new();
        container_names.insert("api".to_string(), "target-api".to_string());
        let target = TargetConfig {
            base_url: "http://localhost:9000".into(),
            database_url: "postgres://x".into(),
            container_names,
            env_file_path: ".env".into(),
            compose_file_path: "docker-compose.yml".into(),
        };

        assert_eq!(target.container_name("api").unwrap(), "target-api");
        assert!(target.container_name("db").is_err());
    }
}
