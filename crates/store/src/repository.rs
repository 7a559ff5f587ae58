//! Repository traits over the persisted entities.

use async_trait::async_trait;
use common::{IdempotencyKey, MenuItemId, OrderId, PaymentId};
use domain::{MenuItem, Order, OrderStatus, Payment};

use crate::Result;

/// Persistence operations for menu items and their stock counter.
///
/// The two decrement primitives back the two sanctioned concurrency
/// strategies. Both reject a decrement that would drive stock negative,
/// aborting the whole transaction with no partial effect.
#[async_trait]
pub trait MenuItemRepository: Send + Sync {
    async fn insert_menu_item(&self, item: MenuItem) -> Result<()>;

    async fn get_menu_item(&self, id: MenuItemId) -> Result<MenuItem>;

    /// Decrements stock under an exclusive row lock held for the duration
    /// of the enclosing transaction. Concurrent decrements on the same
    /// item serialize; other items are unaffected.
    async fn decrement_stock_exclusive(&self, id: MenuItemId, quantity: u32) -> Result<()>;

    /// Decrements stock in a single guarded transaction without taking a
    /// row lock first. Safe only when the caller holds an external lock
    /// spanning the call.
    async fn decrement_stock_plain(&self, id: MenuItemId, quantity: u32) -> Result<()>;

    /// Restores stock (order cancellation compensation).
    async fn restore_stock(&self, id: MenuItemId, quantity: u32) -> Result<()>;
}

/// Split read/write stock access with no mutual exclusion.
///
/// Exists only to reproduce the lost-update race in tests and demos;
/// production code must never call these. Implemented by the in-memory
/// store only.
#[async_trait]
pub trait UnsafeStockAccess: Send + Sync {
    /// Reads the current stock value outside any lock.
    async fn read_stock(&self, id: MenuItemId) -> Result<u32>;

    /// Overwrites the stock value without any guard or version bump check.
    async fn write_stock_unchecked(&self, id: MenuItemId, stock: u32) -> Result<()>;
}

/// Persistence operations for orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a new order with its items.
    ///
    /// If the order carries an idempotency key that is already present,
    /// fails with [`StoreError::DuplicateOrderKey`] naming the existing
    /// order, so a losing concurrent creation can return the winner.
    ///
    /// [`StoreError::DuplicateOrderKey`]: crate::StoreError::DuplicateOrderKey
    async fn insert_order(&self, order: Order) -> Result<()>;

    async fn get_order(&self, id: OrderId) -> Result<Order>;

    async fn find_order_by_key(&self, key: &IdempotencyKey) -> Result<Option<Order>>;

    /// Transitions the order's status, validating against the *stored*
    /// current status atomically. Disallowed transitions fail with
    /// `DomainError::InvalidTransition` and persist nothing.
    async fn update_order_status(&self, id: OrderId, new_status: OrderStatus) -> Result<Order>;
}

/// Persistence operations for payments.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts a new payment row.
    ///
    /// Fails with `DuplicatePaymentKey` if the idempotency key is taken,
    /// or `DuplicateOrderPayment` if the order already has a payment.
    async fn insert_payment(&self, payment: Payment) -> Result<()>;

    async fn get_payment(&self, id: PaymentId) -> Result<Payment>;

    async fn find_payment_by_key(&self, key: &IdempotencyKey) -> Result<Option<Payment>>;

    async fn find_payment_by_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// Marks the payment successful, recording the gateway transaction id.
    async fn mark_payment_success(&self, id: PaymentId, transaction_id: &str) -> Result<Payment>;

    /// Marks the payment failed.
    async fn mark_payment_failed(&self, id: PaymentId) -> Result<Payment>;

    /// Refunds a successful payment.
    async fn mark_payment_refunded(&self, id: PaymentId) -> Result<Payment>;
}
