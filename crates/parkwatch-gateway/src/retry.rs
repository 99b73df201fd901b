//! Opt-in retry layer for backend calls.
//!
//! Only transient failures are retried: timeouts, connection errors, 429 and
//! 5xx. Rejections such as 409 or 404 are returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::client::BackendGateway;
use crate::error::GatewayResult;
use crate::metrics;
use crate::types::{EntryRequest, EntryResponse, ExitRequest, ExitResponse, OccupancyAck, OccupancyUpdateRequest};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(2u32.pow(exponent)).min(self.max_delay)
    }
}

/// Wraps a gateway and retries transient failures with exponential backoff.
pub struct RetryingGateway<G> {
    inner: G,
    config: RetryConfig,
}

impl<G: BackendGateway> RetryingGateway<G> {
    pub fn new(inner: G, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn run<'a, T, F, Fut>(&'a self, operation: &'static str, call: F) -> GatewayResult<T>
    where
        F: Fn(&'a G) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match call(&self.inner).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempts = attempt + 1, "Backend call recovered");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.config.delay_for_attempt(attempt);
                    warn!(operation, attempt, "Backend call failed, retrying in {:?}: {}", delay, e);
                    metrics::record_retry(operation);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<G: BackendGateway> BackendGateway for RetryingGateway<G> {
    async fn register_entry(&self, request: &EntryRequest) -> GatewayResult<EntryResponse> {
        self.run("register_entry", |g| g.register_entry(request)).await
    }

    async fn register_exit(&self, plate: &str, request: &ExitRequest) -> GatewayResult<ExitResponse> {
        self.run("register_exit", |g| g.register_exit(plate, request)).await
    }

    async fn update_occupancy(&self, request: &OccupancyUpdateRequest) -> GatewayResult<OccupancyAck> {
        self.run("update_occupancy", |g| g.update_occupancy(request)).await
    }
}
