//! Shared application state wired up in `main.rs` and injected into every
//! handler via `web::Data`.

use crate::context::ActionContext;
use crate::rate_limiter::ActionRateLimiter;

pub struct AppState {
    pub ctx: ActionContext,
    pub limiter: ActionRateLimiter,
    pub health_check_path: String,
    pub pool_capacity: u32,
}
