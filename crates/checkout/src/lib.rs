//! Order and payment orchestration.
//!
//! [`OrderService`] drives order creation and lifecycle transitions;
//! [`PaymentOrchestrator`] drives payments to a terminal state behind a
//! circuit breaker, bounded retries, and per-call deadlines. Both treat
//! an idempotency-key replay as a success and hand notifications off
//! without blocking on delivery.

mod breaker;
mod error;
mod gateway;
mod idempotent;
mod notify;
mod order_service;
mod payment_service;
mod retry;

pub use breaker::{BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use error::{CheckoutError, Result};
pub use idempotent::Idempotent;
pub use gateway::{
    GatewayError, GatewayRequest, GatewayResponse, GatewayTimeouts, MockGateway, PaymentGateway,
};
pub use notify::{
    ChannelNotificationDispatcher, DispatchError, NoopDispatcher, NotificationDispatcher,
    NotificationEvent,
};
pub use order_service::{CreateOrderRequest, OrderLine, OrderService};
pub use payment_service::PaymentOrchestrator;
pub use retry::RetryPolicy;
