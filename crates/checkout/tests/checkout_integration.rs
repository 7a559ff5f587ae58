//! End-to-end orchestration scenarios over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use checkout::{
    BreakerState, CheckoutError, CircuitBreaker, CircuitBreakerConfig, CreateOrderRequest,
    GatewayError, GatewayTimeouts, MockGateway, NoopDispatcher, OrderLine, OrderService,
    PaymentOrchestrator, RetryPolicy,
};
use common::{CustomerId, IdempotencyKey, MenuItemId, Money, RestaurantId};
use domain::{MenuItem, OrderStatus, PaymentStatus};
use inventory::ExclusiveRowDecrementer;
use store::{InMemoryStore, MenuItemRepository};

type Orders = OrderService<InMemoryStore, ExclusiveRowDecrementer<InMemoryStore>, NoopDispatcher>;
type Payments = PaymentOrchestrator<InMemoryStore, MockGateway, NoopDispatcher>;

struct Harness {
    store: Arc<InMemoryStore>,
    orders: Arc<Orders>,
    payments: Payments,
    gateway: MockGateway,
    menu_item_id: MenuItemId,
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        multiplier: 2.0,
    }
}

fn fast_breaker() -> CircuitBreakerConfig {
    CircuitBreakerConfig {
        open_cooldown: Duration::from_millis(50),
        ..CircuitBreakerConfig::default()
    }
}

async fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let item = MenuItem::new(
        RestaurantId::new(),
        "Bibim Naengmyeon",
        Money::from_minor(11000),
        100,
    );
    let menu_item_id = item.id();
    store.insert_menu_item(item).await.unwrap();

    let orders = Arc::new(OrderService::new(
        store.clone(),
        Arc::new(ExclusiveRowDecrementer::new(store.clone())),
        Arc::new(NoopDispatcher),
    ));

    let gateway = MockGateway::new();
    let payments = PaymentOrchestrator::new(
        store.clone(),
        Arc::new(gateway.clone()),
        Arc::new(NoopDispatcher),
        Arc::new(CircuitBreaker::new(fast_breaker())),
        fast_retry(),
        GatewayTimeouts::default(),
    );

    Harness {
        store,
        orders,
        payments,
        gateway,
        menu_item_id,
    }
}

impl Harness {
    async fn place_order(&self, quantity: u32, key: Option<&str>) -> domain::Order {
        self.orders
            .create_order(CreateOrderRequest {
                customer_id: CustomerId::new(),
                restaurant_id: RestaurantId::new(),
                idempotency_key: key.map(IdempotencyKey::new),
                lines: vec![OrderLine {
                    menu_item_id: self.menu_item_id,
                    quantity,
                }],
            })
            .await
            .unwrap()
            .into_inner()
    }
}

#[tokio::test]
async fn payment_happy_path_marks_order_paid() {
    let h = harness().await;
    let order = h.place_order(2, None).await;

    let outcome = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("PAY-1"))
        .await
        .unwrap();

    assert!(!outcome.is_replay());
    let payment = outcome.into_inner();
    assert_eq!(payment.status(), PaymentStatus::Success);
    assert_eq!(payment.amount(), order.total_amount());
    assert!(payment.transaction_id().is_some());
    assert_eq!(h.gateway.call_count(), 1);

    let paid = h.orders.get_order(order.id()).await.unwrap();
    assert_eq!(paid.status(), OrderStatus::Paid);
}

#[tokio::test]
async fn concurrent_order_creation_with_same_key_yields_one_order() {
    let h = harness().await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let orders = h.orders.clone();
        let menu_item_id = h.menu_item_id;
        handles.push(tokio::spawn(async move {
            orders
                .create_order(CreateOrderRequest {
                    customer_id: CustomerId::new(),
                    restaurant_id: RestaurantId::new(),
                    idempotency_key: Some(IdempotencyKey::new("SAME-KEY")),
                    lines: vec![OrderLine {
                        menu_item_id,
                        quantity: 1,
                    }],
                })
                .await
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().unwrap());
    }

    // Every caller got the same order, exactly one caller created it,
    // exactly one row exists, and stock went down by one order's worth.
    let mut ids: Vec<_> = outcomes.iter().map(|o| o.get().id()).collect();
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(outcomes.iter().filter(|o| !o.is_replay()).count(), 1);
    assert_eq!(h.store.order_count().await, 1);
    assert_eq!(
        h.store.get_menu_item(h.menu_item_id).await.unwrap().stock(),
        99
    );
}

#[tokio::test]
async fn retry_recovers_from_transient_failures_with_one_key() {
    let h = harness().await;
    let order = h.place_order(1, None).await;

    h.gateway.enqueue_failure(GatewayError::Timeout);
    h.gateway
        .enqueue_failure(GatewayError::Connection("reset".into()));

    let payment = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("RETRY-1"))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(payment.status(), PaymentStatus::Success);

    // Three attempts, all carrying the same idempotency key.
    let calls = h.gateway.calls();
    assert_eq!(calls.len(), 3);
    assert!(
        calls
            .iter()
            .all(|c| c.idempotency_key.as_str() == "RETRY-1")
    );
}

#[tokio::test]
async fn exhausted_retries_leave_failed_payment_and_pending_order() {
    let h = harness().await;
    let order = h.place_order(1, None).await;

    h.gateway.enqueue_failures(GatewayError::Timeout, 3);

    let result = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("EXH-1"))
        .await;
    assert!(matches!(result, Err(CheckoutError::Business(_))));
    assert_eq!(h.gateway.call_count(), 3);

    // The attempt is terminal: a persisted Failed row, order untouched.
    let recorded = h
        .payments
        .find_payment_by_order(order.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recorded.status(), PaymentStatus::Failed);
    assert_eq!(
        h.orders.get_order(order.id()).await.unwrap().status(),
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn decline_fails_without_retrying() {
    let h = harness().await;
    let order = h.place_order(1, None).await;

    h.gateway
        .enqueue_failure(GatewayError::Declined("insufficient funds".into()));

    let result = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("DEC-1"))
        .await;

    match result {
        Err(CheckoutError::Business(message)) => {
            assert!(message.contains("insufficient funds"));
        }
        other => panic!("expected Business error, got {other:?}"),
    }
    assert_eq!(h.gateway.call_count(), 1);

    let recorded = h
        .payments
        .find_payment_by_order(order.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recorded.status(), PaymentStatus::Failed);
}

#[tokio::test]
async fn mismatched_payment_amount_is_rejected_before_charging() {
    let h = harness().await;
    let order = h.place_order(2, None).await;

    // A stale amount (one item's worth instead of two) never reaches the
    // gateway and leaves no payment row behind.
    let result = h
        .payments
        .request_payment(
            order.id(),
            Money::from_minor(11000),
            IdempotencyKey::new("STALE-1"),
        )
        .await;

    match result {
        Err(CheckoutError::Business(message)) => {
            assert!(message.contains("does not match"));
        }
        other => panic!("expected Business error, got {other:?}"),
    }
    assert_eq!(h.gateway.call_count(), 0);
    assert_eq!(h.store.payment_count().await, 0);

    // The correct amount still goes through afterwards.
    let payment = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("STALE-2"))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(payment.status(), PaymentStatus::Success);
}

#[tokio::test]
async fn replayed_payment_key_does_not_touch_the_gateway_again() {
    let h = harness().await;
    let order = h.place_order(1, None).await;

    let first = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("REPLAY-1"))
        .await
        .unwrap();
    let second = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("REPLAY-1"))
        .await
        .unwrap();

    assert!(!first.is_replay());
    assert!(second.is_replay());
    assert_eq!(first.get().id(), second.get().id());
    assert_eq!(h.gateway.call_count(), 1);
    assert_eq!(h.store.payment_count().await, 1);
}

#[tokio::test]
async fn replayed_failed_payment_returns_the_recorded_failure() {
    let h = harness().await;
    let order = h.place_order(1, None).await;

    h.gateway.enqueue_failures(GatewayError::Timeout, 3);
    let _ = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("FAILED-1"))
        .await;

    // Replaying the failed attempt's key returns the Failed row and does
    // not re-charge.
    let replay = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("FAILED-1"))
        .await
        .unwrap();
    assert!(replay.is_replay());
    assert_eq!(replay.get().status(), PaymentStatus::Failed);
    assert_eq!(h.gateway.call_count(), 3);
}

#[tokio::test]
async fn second_payment_for_an_order_is_rejected() {
    let h = harness().await;
    let order = h.place_order(1, None).await;

    h.payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("ONE-1"))
        .await
        .unwrap();

    let result = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("ONE-2"))
        .await;
    assert!(matches!(result, Err(CheckoutError::Business(_))));
}

#[tokio::test]
async fn paying_a_non_pending_order_is_rejected() {
    let h = harness().await;
    let order = h.place_order(1, None).await;

    h.orders
        .update_order_status(order.id(), OrderStatus::Cancelled)
        .await
        .unwrap();

    let result = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("LATE-1"))
        .await;
    assert!(matches!(result, Err(CheckoutError::Business(_))));
    assert_eq!(h.gateway.call_count(), 0);
}

#[tokio::test]
async fn breaker_opens_after_repeated_failures_and_fails_fast() {
    let h = harness().await;

    // Five failed payments (each exhausting its retries) open the breaker.
    for i in 0..5 {
        let order = h.place_order(1, None).await;
        h.gateway.enqueue_failures(GatewayError::Timeout, 3);
        let _ = h
            .payments
            .request_payment(order.id(), order.total_amount(), IdempotencyKey::new(format!("BRK-{i}")))
            .await;
    }
    assert_eq!(h.payments.breaker().state(), BreakerState::Open);
    let calls_so_far = h.gateway.call_count();

    // While open, attempts fail fast without touching the gateway but
    // still settle their payment row as Failed.
    let order = h.place_order(1, None).await;
    let result = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("BRK-FAST"))
        .await;
    assert!(matches!(result, Err(CheckoutError::Business(_))));
    assert_eq!(h.gateway.call_count(), calls_so_far);

    let recorded = h
        .payments
        .find_payment_by_order(order.id())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(recorded.status(), PaymentStatus::Failed);
}

#[tokio::test]
async fn breaker_recovers_through_half_open_trials() {
    let h = harness().await;

    for i in 0..5 {
        let order = h.place_order(1, None).await;
        h.gateway.enqueue_failures(GatewayError::Timeout, 3);
        let _ = h
            .payments
            .request_payment(order.id(), order.total_amount(), IdempotencyKey::new(format!("RCV-{i}")))
            .await;
    }
    assert_eq!(h.payments.breaker().state(), BreakerState::Open);

    // Wait out the cooldown, then let healthy trial calls close it.
    tokio::time::sleep(Duration::from_millis(60)).await;

    for i in 0..3 {
        let order = h.place_order(1, None).await;
        h.payments
            .request_payment(order.id(), order.total_amount(), IdempotencyKey::new(format!("TRIAL-{i}")))
            .await
            .unwrap();
    }
    assert_eq!(h.payments.breaker().state(), BreakerState::Closed);
}

#[tokio::test]
async fn every_payment_attempt_reaches_a_terminal_status() {
    let h = harness().await;

    // Mixed outcomes: success, decline, retry-exhaustion.
    h.gateway.enqueue_failure(GatewayError::Declined("no".into()));
    h.gateway.enqueue_failures(GatewayError::Timeout, 3);

    for i in 0..3 {
        let order = h.place_order(1, None).await;
        let _ = h
            .payments
            .request_payment(order.id(), order.total_amount(), IdempotencyKey::new(format!("TERM-{i}")))
            .await;
    }

    assert_eq!(h.store.payment_count().await, 3);
    // Replaying each key short-circuits on the recorded row, so the
    // order id and amount here are never consulted.
    for i in 0..3 {
        let payment = h
            .payments
            .request_payment(
                common::OrderId::new(),
                Money::from_minor(11000),
                IdempotencyKey::new(format!("TERM-{i}")),
            )
            .await
            .unwrap();
        assert!(payment.is_replay());
        assert!(payment.get().status().is_settled());
    }
}

#[tokio::test]
async fn refund_flows_from_success_only() {
    let h = harness().await;
    let order = h.place_order(1, None).await;

    let payment = h
        .payments
        .request_payment(order.id(), order.total_amount(), IdempotencyKey::new("RFD-1"))
        .await
        .unwrap()
        .into_inner();

    let refunded = h.payments.refund_payment(payment.id()).await.unwrap();
    assert_eq!(refunded.status(), PaymentStatus::Refunded);

    let result = h.payments.refund_payment(payment.id()).await;
    assert!(matches!(result, Err(CheckoutError::Domain(_))));
}
