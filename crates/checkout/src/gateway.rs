//! Payment gateway seam and the scriptable mock used in tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{IdempotencyKey, Money, OrderId};
use thiserror::Error;

/// Failures a gateway call can produce.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The call did not complete within the deadline.
    #[error("payment gateway timed out")]
    Timeout,

    /// The gateway could not be reached.
    #[error("payment gateway unreachable: {0}")]
    Connection(String),

    /// The gateway reached a definitive negative decision.
    #[error("payment declined: {0}")]
    Declined(String),
}

impl GatewayError {
    /// Transient errors are worth retrying; a decline is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Connection(_))
    }
}

/// Deadlines for a gateway call.
///
/// Connect and read bounds collapse into one overall deadline at this
/// trait boundary; the orchestrator enforces it with `tokio::time::timeout`.
#[derive(Debug, Clone, Copy)]
pub struct GatewayTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl GatewayTimeouts {
    pub fn overall(&self) -> Duration {
        self.connect + self.read
    }
}

impl Default for GatewayTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(3),
            read: Duration::from_secs(5),
        }
    }
}

/// A charge request forwarded to the gateway.
///
/// The idempotency key is part of the wire request: the gateway
/// deduplicates on it, which is what makes resending the same request
/// after a timeout safe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayRequest {
    pub order_id: OrderId,
    pub amount: Money,
    pub idempotency_key: IdempotencyKey,
}

/// A successful gateway settlement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayResponse {
    pub transaction_id: String,
}

/// External payment gateway.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError>;
}

#[derive(Default)]
struct MockState {
    scripted_failures: VecDeque<GatewayError>,
    latency: Option<Duration>,
    calls: Vec<GatewayRequest>,
    next_id: u32,
}

/// Scriptable gateway for tests.
///
/// Failures are consumed in order before calls start succeeding; every
/// call is recorded, including its idempotency key, so tests can assert
/// how many attempts were made and that the key never changed.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a failure to be returned by an upcoming call.
    pub fn enqueue_failure(&self, error: GatewayError) {
        self.state.lock().unwrap().scripted_failures.push_back(error);
    }

    /// Queues `count` copies of the same failure.
    pub fn enqueue_failures(&self, error: GatewayError, count: usize) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state.scripted_failures.push_back(error.clone());
        }
    }

    /// Adds artificial latency to every successful call.
    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = Some(latency);
    }

    /// Returns every request the gateway has seen.
    pub fn calls(&self) -> Vec<GatewayRequest> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn charge(&self, request: &GatewayRequest) -> Result<GatewayResponse, GatewayError> {
        let (outcome, latency) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(request.clone());

            match state.scripted_failures.pop_front() {
                Some(error) => (Err(error), None),
                None => {
                    state.next_id += 1;
                    let transaction_id = format!("PG-TXN-{:04}", state.next_id);
                    (Ok(GatewayResponse { transaction_id }), state.latency)
                }
            }
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(key: &str) -> GatewayRequest {
        GatewayRequest {
            order_id: OrderId::new(),
            amount: Money::from_minor(15000),
            idempotency_key: IdempotencyKey::new(key),
        }
    }

    #[tokio::test]
    async fn scripted_failures_consumed_before_success() {
        let gateway = MockGateway::new();
        gateway.enqueue_failures(GatewayError::Timeout, 2);

        let req = request("K1");
        assert_eq!(gateway.charge(&req).await, Err(GatewayError::Timeout));
        assert_eq!(gateway.charge(&req).await, Err(GatewayError::Timeout));
        assert!(gateway.charge(&req).await.is_ok());
        assert_eq!(gateway.call_count(), 3);
    }

    #[tokio::test]
    async fn records_idempotency_key_of_every_call() {
        let gateway = MockGateway::new();
        gateway.enqueue_failure(GatewayError::Connection("refused".into()));

        let req = request("K2");
        let _ = gateway.charge(&req).await;
        let _ = gateway.charge(&req).await;

        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|c| c.idempotency_key.as_str() == "K2"));
    }

    #[test]
    fn transience_classification() {
        assert!(GatewayError::Timeout.is_transient());
        assert!(GatewayError::Connection("x".into()).is_transient());
        assert!(!GatewayError::Declined("insufficient funds".into()).is_transient());
    }

    #[test]
    fn overall_deadline_is_connect_plus_read() {
        let timeouts = GatewayTimeouts::default();
        assert_eq!(timeouts.overall(), Duration::from_secs(8));
    }
}
