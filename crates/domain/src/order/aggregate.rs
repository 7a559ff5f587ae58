//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{CustomerId, IdempotencyKey, MenuItemId, Money, OrderId, RestaurantId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use super::OrderStatus;

/// A line item within an order.
///
/// Name and unit price are captured at order time and never change,
/// even if the menu item is later repriced or renamed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The menu item this line refers to.
    pub menu_item_id: MenuItemId,

    /// Menu item name frozen at order time.
    pub name: String,

    /// Unit price frozen at order time.
    pub unit_price: Money,

    /// Quantity ordered (always positive).
    pub quantity: u32,
}

impl OrderItem {
    /// Creates a new order item.
    pub fn new(
        menu_item_id: MenuItemId,
        name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            menu_item_id,
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    /// Returns the total price for this line (unit price × quantity).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Order aggregate root.
///
/// Items are added only while the order is being assembled (before it is
/// handed to a repository); afterwards the only mutation path is the
/// status-transition API. The total amount is recomputed synchronously
/// inside every item addition, so it always equals the sum over items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    customer_id: CustomerId,
    restaurant_id: RestaurantId,
    items: Vec<OrderItem>,
    total_amount: Money,
    status: OrderStatus,
    idempotency_key: Option<IdempotencyKey>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new empty order in `Pending` status.
    pub fn new(
        customer_id: CustomerId,
        restaurant_id: RestaurantId,
        idempotency_key: Option<IdempotencyKey>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            customer_id,
            restaurant_id,
            items: Vec::new(),
            total_amount: Money::zero(),
            status: OrderStatus::Pending,
            idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds an order from persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: OrderId,
        customer_id: CustomerId,
        restaurant_id: RestaurantId,
        items: Vec<OrderItem>,
        status: OrderStatus,
        idempotency_key: Option<IdempotencyKey>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let total_amount = items.iter().map(OrderItem::line_total).sum();
        Self {
            id,
            customer_id,
            restaurant_id,
            items,
            total_amount,
            status,
            idempotency_key,
            created_at,
            updated_at,
        }
    }

    /// Adds an item and recomputes the total in the same operation.
    ///
    /// The line total and the running total are computed with checked
    /// arithmetic, so an amount that does not fit the money range is
    /// rejected before anything is stored.
    pub fn add_item(&mut self, item: OrderItem) -> Result<(), DomainError> {
        if item.quantity == 0 {
            return Err(DomainError::InvalidQuantity {
                quantity: item.quantity,
            });
        }

        let line_total = item
            .unit_price
            .checked_mul(item.quantity)
            .ok_or(DomainError::AmountOverflow)?;
        let total = self
            .total_amount
            .checked_add(line_total)
            .ok_or(DomainError::AmountOverflow)?;

        self.items.push(item);
        self.total_amount = total;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Transitions the order to a new status.
    ///
    /// Disallowed transitions fail and leave the status unchanged.
    pub fn transition_to(&mut self, new_status: OrderStatus) -> Result<(), DomainError> {
        self.status = self.status.transition_to(new_status)?;
        self.updated_at = Utc::now();
        Ok(())
    }

    // Query methods

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn customer_id(&self) -> CustomerId {
        self.customer_id
    }

    pub fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn idempotency_key(&self) -> Option<&IdempotencyKey> {
        self.idempotency_key.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn has_items(&self) -> bool {
        !self.items.is_empty()
    }
}
