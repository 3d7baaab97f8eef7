//! HTTP adapter: hits the target application's endpoints for probes, holds
//! (db-pool exhaustion), and rate-limit floods.

use async_trait::async_trait;
use governor::{Quota, RateLimiter as GovernorRateLimiter};
use shared::{Error, Result};
use std::num::NonZeroU32;
use std::time::Duration;

const ADAPTER: &str = "http";

/// Bucket a single flood response falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    RateLimited,
    Error,
}

/// Aggregate counters from a flood run (§4.2.e).
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FloodStats {
    pub success: u32,
    pub rate_limited: u32,
    pub error: u32,
}

impl FloodStats {
    pub fn record(&mut self, class: ResponseClass) {
        match class {
            ResponseClass::Success => self.success += 1,
            ResponseClass::RateLimited => self.rate_limited += 1,
            ResponseClass::Error => self.error += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.success + self.rate_limited + self.error
    }
}

#[async_trait]
pub trait HttpAdapter: Send + Sync {
    /// Plain GET, classified by status code.
    async fn get(&self, url: &str, timeout: Duration) -> Result<ResponseClass>;

    /// GET returning the decoded JSON body, used where the caller needs the
    /// response content rather than just its status (e.g. reading back the
    /// target's current rate-limit configuration before overwriting it).
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<serde_json::Value>;

    /// Plain POST with a JSON body, classified by status code.
    async fn post(&self, url: &str, body: serde_json::Value, timeout: Duration) -> Result<ResponseClass>;

    /// Fire `total` requests at `rps` requests/second against `url`,
    /// returning the classified counters (§4.2.e's flood driver; also used
    /// by the db-pool-exhaustion fault's `hold` strategy).
    async fn flood(&self, url: &str, total: u32, rps: u32, timeout: Duration) -> Result<FloodStats>;
}

fn classify(status: reqwest::StatusCode) -> ResponseClass {
    if status.as_u16() == 429 {
        ResponseClass::RateLimited
    } else if status.is_success() {
        ResponseClass::Success
    } else {
        ResponseClass::Error
    }
}

/// Real `reqwest`-backed adapter.
pub struct ReqwestHttpAdapter {
    client: reqwest::Client,
}

impl ReqwestHttpAdapter {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::adapter(ADAPTER, format!("failed to build client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpAdapter for ReqwestHttpAdapter {
    async fn get(&self, url: &str, timeout: Duration) -> Result<ResponseClass> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(timeout)
                } else {
                    Error::adapter(ADAPTER, e.to_string())
                }
            })?;
        Ok(classify(resp.status()))
    }

    async fn get_json(&self, url: &str, timeout: Duration) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(timeout)
                } else {
                    Error::adapter(ADAPTER, e.to_string())
                }
            })?;
        resp.json::<serde_json::Value>()
            .await
            .map_err(|e| Error::adapter(ADAPTER, format!("failed to decode JSON body: {e}")))
    }

    async fn post(&self, url: &str, body: serde_json::Value, timeout: Duration) -> Result<ResponseClass> {
        let resp = self
            .client
            .post(url)
            .json(&body)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout(timeout)
                } else {
                    Error::adapter(ADAPTER, e.to_string())
                }
            })?;
        Ok(classify(resp.status()))
    }

    async fn flood(&self, url: &str, total: u32, rps: u32, timeout: Duration) -> Result<FloodStats> {
        let rps = rps.max(1);
        let quota = Quota::per_second(NonZeroU32::new(rps).unwrap());
        let limiter = GovernorRateLimiter::direct(quota);

        let mut stats = FloodStats::default();
        for _ in 0..total {
            limiter.until_ready().await;
            match self.get(url, timeout).await {
                Ok(class) => stats.record(class),
                Err(_) => stats.record(ResponseClass::Error),
            }
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_codes() {
        assert_eq!(classify(reqwest::StatusCode::OK), ResponseClass::Success);
        assert_eq!(
            classify(reqwest::StatusCode::TOO_MANY_REQUESTS),
            ResponseClass::RateLimited
        );
        assert_eq!(
            classify(reqwest::StatusCode::INTERNAL_SERVER_ERROR),
            ResponseClass::Error
        );
    }

    #[test]
    fn test_flood_stats_record_and_total() {
        let mut stats = FloodStats::default();
        stats.record(ResponseClass::Success);
        stats.record(ResponseClass::Success);
        stats.record(ResponseClass::RateLimited);
        stats.record(ResponseClass::Error);

        assert_eq!(stats.success, 2);
        assert_eq!(stats.rate_limited, 1);
        assert_eq!(stats.error, 1);
        assert_eq!(stats.total(), 4);
    }
}
