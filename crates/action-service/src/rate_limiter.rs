//! Per-action rate limiting for the remediation workflow engine (§4.4:
//! "pre-flight policy (rate limit per action: at most `k` executions per
//! rolling minute)").
//!
//! Each atomic action gets its own rolling-minute quota, looked up lazily by
//! name the first time it fires. Unlike a message-send limiter this never
//! waits for a slot to free up: a request that arrives over quota is a
//! caller-owned policy denial (§7 `Rejected`), not something worth
//! delaying the HTTP response for.

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorRateLimiter,
};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Mutex;

type ActionLimiter = GovernorRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rolling-minute rate limiter keyed by action name.
pub struct ActionRateLimiter {
    max_per_minute: u32,
    limiters: Mutex<HashMap<String, ActionLimiter>>,
}

impl ActionRateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute: max_per_minute.max(1),
            limiters: Mutex::new(HashMap::new()),
        }
    }

    /// `true` if `action` is still within its rolling-minute budget; the
    /// budget is consumed whether or not the caller proceeds to act on it.
    pub fn check(&self, action: &str) -> bool {
        let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());
        let limiter = limiters.entry(action.to_string()).or_insert_with(|| {
            let quota = Quota::per_minute(NonZeroU32::new(self.max_per_minute).unwrap());
            GovernorRateLimiter::direct(quota)
        });
        limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_up_to_the_minute_budget() {
        let limiter = ActionRateLimiter::new(2);
        assert!(limiter.check("restart-target-api"));
        assert!(limiter.check("restart-target-api"));
        assert!(!limiter.check("restart-target-api"));
    }

    #[test]
    fn test_tracks_actions_independently() {
        let limiter = ActionRateLimiter::new(1);
        assert!(limiter.check("restart-target-api"));
        assert!(limiter.check("restart-target-db"));
        assert!(!limiter.check("restart-target-api"));
    }
}
