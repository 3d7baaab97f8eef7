//! One module per fault kind (§4.2), each implementing [`crate::module::FaultModule`].

pub mod api_crash;
pub mod db_pool;
pub mod env_var;
pub mod long_transaction;
pub mod migration;
pub mod rate_limit;

use crate::module::{FaultModule, TargetContext};
use crate::types::AttackKind;
use std::collections::HashMap;
use std::sync::Arc;

/// Build the kind -> module table the lifecycle engine dispatches on.
pub fn build_modules(ctx: Arc<TargetContext>) -> HashMap<AttackKind, Arc<dyn FaultModule>> {
    let mut modules: HashMap<AttackKind, Arc<dyn FaultModule>> = HashMap::new();
    modules.insert(AttackKind::DbPool, Arc::new(db_pool::DbPoolModule::new(Arc::clone(&ctx))));
    modules.insert(
        AttackKind::LongTransaction,
        Arc::new(long_transaction::LongTransactionModule::new(Arc::clone(&ctx))),
    );
    modules.insert(AttackKind::EnvVar, Arc::new(env_var::EnvVarModule::new(Arc::clone(&ctx))));
    modules.insert(AttackKind::ApiCrash, Arc::new(api_crash::ApiCrashModule::new(Arc::clone(&ctx))));
    modules.insert(AttackKind::RateLimit, Arc::new(rate_limit::RateLimitModule::new(Arc::clone(&ctx))));
    modules.insert(AttackKind::Migration, Arc::new(migration::MigrationModule::new(ctx)));
    modules
}
