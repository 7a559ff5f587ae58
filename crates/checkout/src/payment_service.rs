//! Payment orchestration against the external gateway.

use std::sync::Arc;

use chrono::Utc;
use common::{IdempotencyKey, Money, OrderId, PaymentId};
use domain::{OrderStatus, Payment};
use store::{OrderRepository, PaymentRepository, StoreError};

use crate::breaker::CircuitBreaker;
use crate::gateway::{
    GatewayError, GatewayRequest, GatewayResponse, GatewayTimeouts, PaymentGateway,
};
use crate::notify::{NotificationDispatcher, NotificationEvent};
use crate::retry::RetryPolicy;
use crate::{CheckoutError, Idempotent, Result};

/// Stable message surfaced while the breaker rejects calls.
const GATEWAY_UNAVAILABLE: &str = "payment gateway unavailable, try again later";

/// Drives a payment to a terminal state.
///
/// The protection layers compose in a fixed order: the circuit breaker
/// admits or rejects the whole attempt, the retry policy re-sends the
/// same idempotent request on transient failures, and every individual
/// gateway call runs under a deadline. Whatever the outcome, the payment
/// row ends up Success or Failed, never dangling Pending.
pub struct PaymentOrchestrator<R, G, N> {
    store: Arc<R>,
    gateway: Arc<G>,
    notifier: Arc<N>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
    timeouts: GatewayTimeouts,
}

impl<R, G, N> PaymentOrchestrator<R, G, N>
where
    R: PaymentRepository + OrderRepository,
    G: PaymentGateway,
    N: NotificationDispatcher,
{
    pub fn new(
        store: Arc<R>,
        gateway: Arc<G>,
        notifier: Arc<N>,
        breaker: Arc<CircuitBreaker>,
        retry: RetryPolicy,
        timeouts: GatewayTimeouts,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            breaker,
            retry,
            timeouts,
        }
    }

    /// Exposed so callers and tests can observe breaker state.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Requests payment of `amount` for an order.
    ///
    /// A key that has been seen before returns the stored payment
    /// without touching the gateway. The order must still be awaiting
    /// payment, and `amount` must equal the order's stored total; a
    /// stale or tampered amount is rejected before anything is charged.
    #[tracing::instrument(skip(self), fields(%order_id))]
    pub async fn request_payment(
        &self,
        order_id: OrderId,
        amount: Money,
        idempotency_key: IdempotencyKey,
    ) -> Result<Idempotent<Payment>> {
        // Idempotency guard: replay returns the recorded outcome.
        if let Some(existing) = self.store.find_payment_by_key(&idempotency_key).await? {
            tracing::info!(payment_id = %existing.id(), "idempotent replay, returning recorded payment");
            metrics::counter!("payments_replayed_total").increment(1);
            return Ok(Idempotent::Replayed(existing));
        }

        let order = self.store.get_order(order_id).await?;
        if order.status() != OrderStatus::Pending {
            return Err(CheckoutError::Business(format!(
                "order is not awaiting payment (status {})",
                order.status()
            )));
        }
        if amount != order.total_amount() {
            return Err(CheckoutError::Business(format!(
                "payment amount {amount} does not match order total {}",
                order.total_amount()
            )));
        }

        // Persist the Pending row before the first gateway call so a
        // crash mid-charge leaves an auditable attempt.
        let payment = Payment::new(order_id, amount, idempotency_key.clone());
        match self.store.insert_payment(payment.clone()).await {
            Ok(()) => {}
            Err(StoreError::DuplicatePaymentKey { existing }) => {
                // Lost a concurrent race on the same key.
                metrics::counter!("payments_replayed_total").increment(1);
                return Ok(Idempotent::Replayed(self.store.get_payment(existing).await?));
            }
            Err(StoreError::DuplicateOrderPayment { existing }) => {
                return Err(CheckoutError::Business(format!(
                    "order already has a payment: {existing}"
                )));
            }
            Err(e) => return Err(e.into()),
        }

        let request = GatewayRequest {
            order_id,
            amount: payment.amount(),
            idempotency_key,
        };

        match self.charge_protected(&request).await {
            Ok(response) => Ok(Idempotent::Created(
                self.settle_success(&payment, order, response).await?,
            )),
            Err(e) => self.settle_failure(payment.id(), e).await.map(Idempotent::Created),
        }
    }

    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment> {
        Ok(self.store.get_payment(id).await?)
    }

    pub async fn find_payment_by_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self.store.find_payment_by_order(order_id).await?)
    }

    /// Refunds a successful payment.
    pub async fn refund_payment(&self, id: PaymentId) -> Result<Payment> {
        let refunded = self.store.mark_payment_refunded(id).await?;
        metrics::counter!("payments_refunded_total").increment(1);
        tracing::info!(payment_id = %id, "payment refunded");
        Ok(refunded)
    }

    /// Breaker around retry around a deadline-bounded gateway call.
    /// Every attempt carries the same idempotency key.
    async fn charge_protected(
        &self,
        request: &GatewayRequest,
    ) -> Result<GatewayResponse> {
        if !self.breaker.try_acquire() {
            metrics::counter!("payments_rejected_breaker_total").increment(1);
            tracing::warn!(order_id = %request.order_id, "circuit open, failing fast");
            return Err(CheckoutError::Business(GATEWAY_UNAVAILABLE.to_string()));
        }

        let deadline = self.timeouts.overall();
        let result = self
            .retry
            .run(|attempt| async move {
                tracing::debug!(attempt, "charging gateway");
                match tokio::time::timeout(deadline, self.gateway.charge(request)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(GatewayError::Timeout),
                }
            })
            .await;

        match result {
            Ok(response) => {
                self.breaker.record_success();
                Ok(response)
            }
            Err(e) => {
                self.breaker.record_failure();
                Err(match e {
                    GatewayError::Declined(reason) => {
                        CheckoutError::Business(format!("payment declined: {reason}"))
                    }
                    GatewayError::Timeout | GatewayError::Connection(_) => {
                        CheckoutError::Business(GATEWAY_UNAVAILABLE.to_string())
                    }
                })
            }
        }
    }

    async fn settle_success(
        &self,
        payment: &Payment,
        order: domain::Order,
        response: GatewayResponse,
    ) -> Result<Payment> {
        let settled = self
            .store
            .mark_payment_success(payment.id(), &response.transaction_id)
            .await?;
        let paid = self
            .store
            .update_order_status(order.id(), OrderStatus::Paid)
            .await?;

        metrics::counter!("payments_succeeded_total").increment(1);
        tracing::info!(payment_id = %settled.id(), transaction_id = response.transaction_id, "payment settled");

        if let Err(e) = self
            .notifier
            .dispatch(NotificationEvent::PaymentSettled {
                order_id: paid.id(),
                customer_id: paid.customer_id(),
                restaurant_id: paid.restaurant_id(),
                total_amount: paid.total_amount(),
                timestamp: Utc::now(),
            })
            .await
        {
            tracing::warn!(error = %e, "notification hand-off failed");
        }

        Ok(settled)
    }

    /// Records the Failed row, then surfaces the original error. The
    /// order stays Pending so the customer can retry with a fresh key.
    async fn settle_failure(&self, payment_id: PaymentId, error: CheckoutError) -> Result<Payment> {
        self.store.mark_payment_failed(payment_id).await?;
        metrics::counter!("payments_failed_total").increment(1);
        tracing::warn!(%payment_id, error = %error, "payment failed");
        Err(error)
    }
}
