//! Target context for the remediation workflow engine: the adapters and
//! identifiers atomic actions and workflows need (§4.5 Target Adapters),
//! kept separate from the fault-injection engine's own context since the
//! two services are independent deployables hitting the same target stack.

use std::sync::Arc;
use target_adapters::{ContainerAdapter, DbAdapter, HttpAdapter};

pub struct ActionContext {
    pub container: Arc<dyn ContainerAdapter>,
    pub db: Arc<dyn DbAdapter>,
    pub http: Arc<dyn HttpAdapter>,
    pub api_container: String,
    pub db_container: String,
    pub base_url: String,
}
