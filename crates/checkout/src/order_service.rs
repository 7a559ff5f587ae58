//! Order creation and lifecycle orchestration.

use std::sync::Arc;

use chrono::Utc;
use common::{CustomerId, IdempotencyKey, MenuItemId, OrderId, RestaurantId};
use domain::{DomainError, Order, OrderItem, OrderStatus};
use inventory::StockDecrementer;
use store::{MenuItemRepository, OrderRepository, StoreError};

use crate::notify::{NotificationDispatcher, NotificationEvent};
use crate::{CheckoutError, Idempotent, Result};

/// A requested order line: which item and how many.
#[derive(Debug, Clone)]
pub struct OrderLine {
    pub menu_item_id: MenuItemId,
    pub quantity: u32,
}

/// Inbound order creation request.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub customer_id: CustomerId,
    pub restaurant_id: RestaurantId,
    pub idempotency_key: Option<IdempotencyKey>,
    pub lines: Vec<OrderLine>,
}

/// Orchestrates order creation (idempotency guard, stock decrement,
/// persistence, notification hand-off) and status transitions.
pub struct OrderService<R, S, N> {
    store: Arc<R>,
    decrementer: Arc<S>,
    notifier: Arc<N>,
}

impl<R, S, N> OrderService<R, S, N>
where
    R: MenuItemRepository + OrderRepository,
    S: StockDecrementer,
    N: NotificationDispatcher,
{
    pub fn new(store: Arc<R>, decrementer: Arc<S>, notifier: Arc<N>) -> Self {
        Self {
            store,
            decrementer,
            notifier,
        }
    }

    /// Creates an order, or returns the existing one when the
    /// idempotency key has been seen before.
    ///
    /// Stock is decremented per line through the configured strategy
    /// before the order row is written; any abort after a partial
    /// decrement restores the already-taken lines.
    #[tracing::instrument(skip(self, request), fields(customer_id = %request.customer_id))]
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Idempotent<Order>> {
        // Idempotency guard: a replay returns the stored order with no
        // stock mutation and no notification.
        if let Some(key) = &request.idempotency_key
            && let Some(existing) = self.store.find_order_by_key(key).await?
        {
            tracing::info!(order_id = %existing.id(), %key, "idempotent replay, returning existing order");
            metrics::counter!("orders_replayed_total").increment(1);
            return Ok(Idempotent::Replayed(existing));
        }

        if request.lines.is_empty() {
            return Err(DomainError::EmptyOrder.into());
        }

        // Freeze name and price per line before touching stock.
        let mut order = Order::new(
            request.customer_id,
            request.restaurant_id,
            request.idempotency_key.clone(),
        );
        for line in &request.lines {
            let menu_item = self.store.get_menu_item(line.menu_item_id).await?;
            if !menu_item.is_available() {
                return Err(DomainError::MenuItemUnavailable {
                    name: menu_item.name().to_string(),
                }
                .into());
            }
            order.add_item(OrderItem::new(
                menu_item.id(),
                menu_item.name(),
                menu_item.price(),
                line.quantity,
            ))?;
        }

        // Decrement stock line by line; an insufficient line aborts the
        // whole order and compensates the lines already taken.
        let mut decremented: Vec<(MenuItemId, u32)> = Vec::new();
        for line in &request.lines {
            match self
                .decrementer
                .decrease_stock(line.menu_item_id, line.quantity)
                .await
            {
                Ok(()) => decremented.push((line.menu_item_id, line.quantity)),
                Err(e) => {
                    self.restore_lines(&decremented).await;
                    metrics::counter!("orders_rejected_total").increment(1);
                    return Err(e.into());
                }
            }
        }

        let created = order.clone();
        match self.store.insert_order(order).await {
            Ok(()) => {}
            Err(StoreError::DuplicateOrderKey { existing }) => {
                // Lost a concurrent race on the same key: hand back the
                // winner's order and put the stock back.
                self.restore_lines(&decremented).await;
                tracing::info!(order_id = %existing, "lost idempotent create race, returning winner");
                metrics::counter!("orders_replayed_total").increment(1);
                return Ok(Idempotent::Replayed(self.store.get_order(existing).await?));
            }
            Err(e) => {
                self.restore_lines(&decremented).await;
                return Err(e.into());
            }
        }

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %created.id(), total = %created.total_amount(), "order created");

        self.notify(NotificationEvent::OrderPlaced {
            order_id: created.id(),
            customer_id: created.customer_id(),
            restaurant_id: created.restaurant_id(),
            total_amount: created.total_amount(),
            timestamp: Utc::now(),
        })
        .await;

        Ok(Idempotent::Created(created))
    }

    /// Transitions an order's status. Cancelling restores the stock the
    /// order had taken.
    #[tracing::instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        order_id: OrderId,
        new_status: OrderStatus,
    ) -> Result<Order> {
        let updated = self.store.update_order_status(order_id, new_status).await?;

        if new_status == OrderStatus::Cancelled {
            let lines: Vec<(MenuItemId, u32)> = updated
                .items()
                .iter()
                .map(|item| (item.menu_item_id, item.quantity))
                .collect();
            self.restore_lines(&lines).await;
            metrics::counter!("orders_cancelled_total").increment(1);
            tracing::info!(%order_id, "order cancelled, stock restored");
        }

        Ok(updated)
    }

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order> {
        Ok(self.store.get_order(order_id).await?)
    }

    async fn restore_lines(&self, lines: &[(MenuItemId, u32)]) {
        for &(id, quantity) in lines {
            if let Err(e) = self.store.restore_stock(id, quantity).await {
                tracing::error!(menu_item_id = %id, quantity, error = %e, "stock restore failed");
            }
        }
    }

    /// Hand-off failures are logged and dropped, never propagated.
    async fn notify(&self, event: NotificationEvent) {
        if let Err(e) = self.notifier.dispatch(event).await {
            tracing::warn!(error = %e, "notification hand-off failed");
        }
    }
}
