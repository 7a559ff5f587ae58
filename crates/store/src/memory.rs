use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{IdempotencyKey, MenuItemId, OrderId, PaymentId};
use domain::{MenuItem, Order, OrderStatus, Payment};
use tokio::sync::{Mutex, RwLock};

use crate::repository::{
    MenuItemRepository, OrderRepository, PaymentRepository, UnsafeStockAccess,
};
use crate::{Result, StoreError};

#[derive(Default)]
struct MenuItems {
    rows: HashMap<MenuItemId, MenuItem>,
}

#[derive(Default)]
struct Orders {
    rows: HashMap<OrderId, Order>,
    by_key: HashMap<IdempotencyKey, OrderId>,
}

#[derive(Default)]
struct Payments {
    rows: HashMap<PaymentId, Payment>,
    by_key: HashMap<IdempotencyKey, PaymentId>,
    by_order: HashMap<OrderId, PaymentId>,
}

/// In-memory store implementation for tests and demos.
///
/// Provides the same contracts as the PostgreSQL implementation:
/// key-uniqueness checks run under the table write lock (the in-memory
/// analogue of a unique constraint), and every guarded stock write takes
/// a per-item mutex first (the analogue of row locking, where a plain
/// `UPDATE` blocks on a held `FOR UPDATE` lock). Only the unsafe
/// baseline's split read/write path skips the row mutex.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    menu_items: Arc<RwLock<MenuItems>>,
    orders: Arc<RwLock<Orders>>,
    payments: Arc<RwLock<Payments>>,
    row_locks: Arc<Mutex<HashMap<MenuItemId, Arc<Mutex<()>>>>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.rows.len()
    }

    /// Returns the number of persisted payments.
    pub async fn payment_count(&self) -> usize {
        self.payments.read().await.rows.len()
    }

    async fn row_lock_for(&self, id: MenuItemId) -> Arc<Mutex<()>> {
        let mut locks = self.row_locks.lock().await;
        locks.entry(id).or_default().clone()
    }
}

#[async_trait]
impl MenuItemRepository for InMemoryStore {
    async fn insert_menu_item(&self, item: MenuItem) -> Result<()> {
        let mut inner = self.menu_items.write().await;
        inner.rows.insert(item.id(), item);
        Ok(())
    }

    async fn get_menu_item(&self, id: MenuItemId) -> Result<MenuItem> {
        let inner = self.menu_items.read().await;
        inner
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("MenuItem", id))
    }

    async fn decrement_stock_exclusive(&self, id: MenuItemId, quantity: u32) -> Result<()> {
        let row_lock = self.row_lock_for(id).await;
        let _guard = row_lock.lock().await;

        // Read and write phases are separate lock acquisitions; the row
        // mutex above is what serializes competing stock writers.
        let mut item = {
            let inner = self.menu_items.read().await;
            inner
                .rows
                .get(&id)
                .cloned()
                .ok_or_else(|| StoreError::not_found("MenuItem", id))?
        };
        item.decrease_stock(quantity)?;

        self.menu_items.write().await.rows.insert(id, item);
        Ok(())
    }

    async fn decrement_stock_plain(&self, id: MenuItemId, quantity: u32) -> Result<()> {
        let row_lock = self.row_lock_for(id).await;
        let _guard = row_lock.lock().await;

        let mut inner = self.menu_items.write().await;
        let item = inner
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("MenuItem", id))?;
        item.decrease_stock(quantity)?;
        Ok(())
    }

    async fn restore_stock(&self, id: MenuItemId, quantity: u32) -> Result<()> {
        // Must wait out an in-flight exclusive decrement, or the restore
        // lands in its read-write gap and is overwritten.
        let row_lock = self.row_lock_for(id).await;
        let _guard = row_lock.lock().await;

        let mut inner = self.menu_items.write().await;
        let item = inner
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("MenuItem", id))?;
        item.restore_stock(quantity);
        Ok(())
    }
}

#[async_trait]
impl UnsafeStockAccess for InMemoryStore {
    async fn read_stock(&self, id: MenuItemId) -> Result<u32> {
        let inner = self.menu_items.read().await;
        inner
            .rows
            .get(&id)
            .map(MenuItem::stock)
            .ok_or_else(|| StoreError::not_found("MenuItem", id))
    }

    async fn write_stock_unchecked(&self, id: MenuItemId, stock: u32) -> Result<()> {
        let mut inner = self.menu_items.write().await;
        let item = inner
            .rows
            .get(&id)
            .ok_or_else(|| StoreError::not_found("MenuItem", id))?;
        let replaced = MenuItem::restore(
            item.id(),
            item.restaurant_id(),
            item.name().to_string(),
            item.description().map(String::from),
            item.price(),
            stock,
            item.is_available(),
            item.version(),
            item.created_at(),
        );
        inner.rows.insert(id, replaced);
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert_order(&self, order: Order) -> Result<()> {
        let mut inner = self.orders.write().await;

        if let Some(key) = order.idempotency_key()
            && let Some(&existing) = inner.by_key.get(key)
        {
            return Err(StoreError::DuplicateOrderKey { existing });
        }

        if let Some(key) = order.idempotency_key() {
            inner.by_key.insert(key.clone(), order.id());
        }
        inner.rows.insert(order.id(), order);
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Order> {
        let inner = self.orders.read().await;
        inner
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Order", id))
    }

    async fn find_order_by_key(&self, key: &IdempotencyKey) -> Result<Option<Order>> {
        let inner = self.orders.read().await;
        Ok(inner
            .by_key
            .get(key)
            .and_then(|id| inner.rows.get(id))
            .cloned())
    }

    async fn update_order_status(&self, id: OrderId, new_status: OrderStatus) -> Result<Order> {
        let mut inner = self.orders.write().await;
        let order = inner
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Order", id))?;
        order.transition_to(new_status)?;
        Ok(order.clone())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert_payment(&self, payment: Payment) -> Result<()> {
        let mut inner = self.payments.write().await;

        if let Some(&existing) = inner.by_key.get(payment.idempotency_key()) {
            return Err(StoreError::DuplicatePaymentKey { existing });
        }
        if let Some(&existing) = inner.by_order.get(&payment.order_id()) {
            return Err(StoreError::DuplicateOrderPayment { existing });
        }

        inner
            .by_key
            .insert(payment.idempotency_key().clone(), payment.id());
        inner.by_order.insert(payment.order_id(), payment.id());
        inner.rows.insert(payment.id(), payment);
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Payment> {
        let inner = self.payments.read().await;
        inner
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Payment", id))
    }

    async fn find_payment_by_key(&self, key: &IdempotencyKey) -> Result<Option<Payment>> {
        let inner = self.payments.read().await;
        Ok(inner
            .by_key
            .get(key)
            .and_then(|id| inner.rows.get(id))
            .cloned())
    }

    async fn find_payment_by_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let inner = self.payments.read().await;
        Ok(inner
            .by_order
            .get(&order_id)
            .and_then(|id| inner.rows.get(id))
            .cloned())
    }

    async fn mark_payment_success(&self, id: PaymentId, transaction_id: &str) -> Result<Payment> {
        let mut inner = self.payments.write().await;
        let payment = inner
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Payment", id))?;
        payment.mark_success(transaction_id)?;
        Ok(payment.clone())
    }

    async fn mark_payment_failed(&self, id: PaymentId) -> Result<Payment> {
        let mut inner = self.payments.write().await;
        let payment = inner
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Payment", id))?;
        payment.mark_failed()?;
        Ok(payment.clone())
    }

    async fn mark_payment_refunded(&self, id: PaymentId) -> Result<Payment> {
        let mut inner = self.payments.write().await;
        let payment = inner
            .rows
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("Payment", id))?;
        payment.mark_refunded()?;
        Ok(payment.clone())
    }
}
