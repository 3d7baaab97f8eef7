//! Safety & Policy Gate (§4.3): bounds validation, kill switch, concurrency
//! caps, target allowlist, and dry-run planning.

use crate::types::{AttackKind, DryRunPlan, FaultParams};
use shared::config::{BoundsConfig, CapsConfig};
use shared::{Error, Result};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct SafetyGate {
    bounds: BoundsConfig,
    caps: CapsConfig,
    kill_switch: AtomicBool,
    /// Container names the engine is allowed to act on. Empty means no
    /// allowlist is configured (anything is permitted).
    allowed_containers: HashSet<String>,
}

impl SafetyGate {
    pub fn new(
        bounds: BoundsConfig,
        caps: CapsConfig,
        kill_switch_initial_tripped: bool,
        allowed_containers: Vec<String>,
    ) -> Self {
        Self {
            bounds,
            caps,
            kill_switch: AtomicBool::new(kill_switch_initial_tripped),
            allowed_containers: allowed_containers.into_iter().collect(),
        }
    }

    pub fn caps(&self) -> &CapsConfig {
        &self.caps
    }

    pub fn kill_switch_tripped(&self) -> bool {
        self.kill_switch.load(Ordering::SeqCst)
    }

    pub fn trip_kill_switch(&self) {
        self.kill_switch.store(true, Ordering::SeqCst);
    }

    /// Reset the kill switch. Not reachable over HTTP in this design (§6
    /// exposes only `POST /kill`); kept so an operator can recover a
    /// long-lived process without a restart.
    pub fn reset_kill_switch(&self) {
        self.kill_switch.store(false, Ordering::SeqCst);
    }

    pub fn check_allowlist(&self, container_name: &str) -> Result<()> {
        if self.allowed_containers.is_empty() || self.allowed_containers.contains(container_name) {
            Ok(())
        } else {
            Err(Error::rejected(format!(
                "container '{container_name}' is not in the configured allowlist"
            )))
        }
    }

    pub fn check_caps(&self, global_in_flight: usize, per_kind_in_flight: usize) -> Result<()> {
        if global_in_flight >= self.caps.max_global_attacks {
            return Err(Error::rejected(format!(
                "global concurrency cap reached ({}/{})",
                global_in_flight, self.caps.max_global_attacks
            )));
        }
        if per_kind_in_flight >= self.caps.max_per_kind {
            return Err(Error::rejected(format!(
                "per-kind concurrency cap reached ({}/{})",
                per_kind_in_flight, self.caps.max_per_kind
            )));
        }
        Ok(())
    }

    /// Validate kind-specific parameter bounds (§4.2). Never mutates
    /// anything; a failed validation performs no side effects (§8 property 5).
    pub fn validate_params(&self, params: &FaultParams) -> Result<()> {
        match params {
            FaultParams::DbPool(p) => {
                in_range("connections", p.connections as u64, 1, self.bounds.db_pool_connections_max as u64)?;
                in_range("hold_seconds", p.hold_seconds, 1, self.bounds.db_pool_hold_seconds_max)?;
            }
            FaultParams::LongTransaction(p) => {
                in_range(
                    "lock_count",
                    p.lock_count as u64,
                    1,
                    self.bounds.long_transaction_lock_count_max as u64,
                )?;
                if let Some(d) = p.duration_seconds {
                    in_range(
                        "duration_seconds",
                        d,
                        1,
                        self.bounds.long_transaction_duration_seconds_max,
                    )?;
                }
                if p.target_table.trim().is_empty() {
                    return Err(Error::invalid_params("target_table must not be empty"));
                }
            }
            FaultParams::EnvVar(p) => {
                if p.env_var_name.trim().is_empty() {
                    return Err(Error::invalid_params("env_var_name must not be empty"));
                }
                if let Some(d) = p.duration_seconds {
                    positive("duration_seconds", d)?;
                }
            }
            FaultParams::ApiCrash(p) => {
                if let Some(d) = p.duration_seconds {
                    positive("duration_seconds", d)?;
                }
            }
            FaultParams::RateLimit(p) => {
                positive("max_requests", p.max_requests as u64)?;
                positive("window_seconds", p.window_seconds)?;
                positive("flood_rate", p.flood_rate as u64)?;
                in_range(
                    "flood_requests",
                    p.flood_requests as u64,
                    1,
                    self.bounds.rate_limit_flood_requests_max as u64,
                )?;
                if p.target_endpoint.trim().is_empty() {
                    return Err(Error::invalid_params("target_endpoint must not be empty"));
                }
            }
            FaultParams::Migration(p) => {
                if let Some(d) = p.duration_seconds {
                    in_range("duration_seconds", d, 1, self.bounds.migration_duration_seconds_max)?;
                }
            }
        }
        Ok(())
    }

    /// Validate and describe the planned side effects without executing
    /// them (§4.3 dry-run).
    pub fn dry_run(&self, params: &FaultParams) -> Result<DryRunPlan> {
        self.validate_params(params)?;

        let (planned_steps, risk_level): (Vec<String>, &str) = match params {
            FaultParams::DbPool(p) => (
                vec![
                    format!("open {} dedicated connections to the target database", p.connections),
                    format!("hold each connection for {} seconds", p.hold_seconds),
                    "close all held connections on rollback".to_string(),
                ],
                "medium",
            ),
            FaultParams::LongTransaction(p) => (
                vec![
                    format!("open a dedicated connection and BEGIN a transaction"),
                    format!("acquire a {:?} on '{}'", p.lock_type, p.target_table),
                    "ROLLBACK (or pg_terminate_backend on force) to release".to_string(),
                ],
                "high",
            ),
            FaultParams::EnvVar(p) => (
                vec![
                    format!("back up the target env file"),
                    format!("rewrite '{}' to simulate {:?}", p.env_var_name, p.failure_type),
                    "restart the target api container".to_string(),
                    "restore the original env file and restart again on rollback".to_string(),
                ],
                "medium",
            ),
            FaultParams::ApiCrash(p) => (
                vec![format!("{:?} the target api container", p.mode)],
                "high",
            ),
            FaultParams::RateLimit(p) => (
                vec![
                    "back up the target's current rate-limit configuration".to_string(),
                    format!("set max_requests={} window_seconds={}", p.max_requests, p.window_seconds),
                    format!(
                        "flood '{}' with {} requests at {} req/s",
                        p.target_endpoint, p.flood_requests, p.flood_rate
                    ),
                    "restore the original rate-limit configuration".to_string(),
                ],
                "low",
            ),
            FaultParams::Migration(p) => (
                vec![
                    "read the current migration version token".to_string(),
                    format!("overwrite it to simulate {:?}", p.corruption),
                    "restore the recorded token on rollback".to_string(),
                ],
                "high",
            ),
        };

        Ok(DryRunPlan {
            kind: params.kind(),
            planned_steps,
            risk_level: risk_level.to_string(),
            estimated_duration_seconds: params.duration_seconds(),
        })
    }
}

fn in_range(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        Err(Error::invalid_params(format!(
            "{field} must be in [{min}, {max}], got {value}"
        )))
    } else {
        Ok(())
    }
}

fn positive(field: &str, value: u64) -> Result<()> {
    if value == 0 {
        Err(Error::invalid_params(format!("{field} must be positive")))
    } else {
        Ok(())
    }
}

/// Used by the registry to tag rejection reasons (kept separate from
/// `Error` so handlers can report it without matching on the kind string).
pub fn kind_label(kind: AttackKind) -> &'static str {
    kind.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DbPoolParams, FaultParams};

    fn gate() -> SafetyGate {
        SafetyGate::new(BoundsConfig::default(), CapsConfig::default(), false, vec![])
    }

    #[test]
    fn test_db_pool_bounds_reject_zero_connections() {
        let params = FaultParams::DbPool(DbPoolParams {
            connections: 0,
            hold_seconds: 5,
            use_hold_endpoint: false,
        });
        assert!(gate().validate_params(&params).is_err());
    }

    #[test]
    fn test_db_pool_bounds_reject_over_max_connections() {
        let params = FaultParams::DbPool(DbPoolParams {
            connections: 501,
            hold_seconds: 5,
            use_hold_endpoint: false,
        });
        assert!(gate().validate_params(&params).is_err());
    }

    #[test]
    fn test_db_pool_bounds_accept_in_range() {
        let params = FaultParams::DbPool(DbPoolParams {
            connections: 20,
            hold_seconds: 5,
            use_hold_endpoint: false,
        });
        assert!(gate().validate_params(&params).is_ok());
    }

    #[test]
    fn test_caps_reject_at_global_limit() {
        let gate = gate();
        assert!(gate.check_caps(gate.caps().max_global_attacks, 0).is_err());
        assert!(gate.check_caps(0, 0).is_ok());
    }

    #[test]
    fn test_kill_switch_starts_untripped_and_can_trip() {
        let gate = gate();
        assert!(!gate.kill_switch_tripped());
        gate.trip_kill_switch();
        assert!(gate.kill_switch_tripped());
    }

    #[test]
    fn test_allowlist_empty_permits_anything() {
        assert!(gate().check_allowlist("anything").is_ok());
    }

    #[test]
    fn test_allowlist_rejects_unknown_container() {
        let gate = SafetyGate::new(
            BoundsConfig::default(),
            CapsConfig::default(),
            false,
            vec!["target-api".to_string()],
        );
        assert!(gate.check_allowlist("target-api").is_ok());
        assert!(gate.check_allowlist("other").is_err());
    }

    #[test]
    fn test_dry_run_does_not_require_adapters() {
        let params = FaultParams::DbPool(DbPoolParams {
            connections: 20,
            hold_seconds: 5,
            use_hold_endpoint: false,
        });
        let plan = gate().dry_run(&params).unwrap();
        assert_eq!(plan.kind, AttackKind::DbPool);
        assert!(!plan.planned_steps.is_empty());
    }
}
