//! Fault Injection & Lifecycle Engine library: the attack registry (§4.1),
//! the six fault modules (§4.2), and the safety & policy gate (§4.3).
//!
//! Kept free of any HTTP surface so the lifecycle engine can be exercised
//! in tests without standing up `actix-web`; `chaos-service` is a thin
//! transport layer over this crate.

pub mod faults;
pub mod module;
pub mod registry;
pub mod safety;
pub mod types;

pub use module::{FaultModule, OwnedResources, RollbackFailure, TargetContext};
pub use registry::Registry;
pub use safety::SafetyGate;
pub use types::{
    ApiCrashMode, ApiCrashParams, AttackKind, AttackRecord, AttackState, DbPoolParams, DryRunPlan,
    EnvFailureType, EnvVarParams, FaultParams, LongTransactionParams, MigrationCorruption,
    MigrationParams, RateLimitParams, RejectionDetail,
};
