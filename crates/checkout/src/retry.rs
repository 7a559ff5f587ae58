//! Bounded retry with exponential backoff for gateway calls.

use std::future::Future;
use std::time::Duration;

use crate::gateway::GatewayError;

/// Retry bounds for transient gateway failures.
///
/// Only transient errors are retried; a decline aborts immediately. The
/// caller must send the same idempotency key on every attempt so the
/// gateway can deduplicate a charge whose response was lost.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Runs `op` until it succeeds, fails definitively, or the attempt
    /// budget is spent. The attempt number (1-based) is passed through
    /// for logging.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, GatewayError>
    where
        F: FnMut(u32) -> Fut + Send,
        Fut: Future<Output = Result<T, GatewayError>> + Send,
    {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    tracing::warn!(attempt, error = %e, backoff_ms = backoff.as_millis() as u64, "transient gateway failure, retrying");
                    metrics::counter!("gateway_retries_total").increment(1);
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.mul_f64(self.multiplier);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
