//! Menu item entity with a guarded stock counter.

use chrono::{DateTime, Utc};
use common::{MenuItemId, Money, RestaurantId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A menu item offered by a restaurant.
///
/// The stock counter is the only contended shared mutable resource in the
/// core. It is never allowed to go negative: a decrement that would
/// underflow is rejected whole, never clamped. Items are never deleted,
/// only soft-disabled via the availability flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    id: MenuItemId,
    restaurant_id: RestaurantId,
    name: String,
    description: Option<String>,
    price: Money,
    stock: u32,
    is_available: bool,
    /// Bumped on every stock write; used for optimistic-conflict detection.
    version: u64,
    created_at: DateTime<Utc>,
}

impl MenuItem {
    /// Creates a new menu item.
    pub fn new(
        restaurant_id: RestaurantId,
        name: impl Into<String>,
        price: Money,
        stock: u32,
    ) -> Self {
        Self {
            id: MenuItemId::new(),
            restaurant_id,
            name: name.into(),
            description: None,
            price,
            stock,
            is_available: true,
            version: 0,
            created_at: Utc::now(),
        }
    }

    /// Rebuilds a menu item from persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: MenuItemId,
        restaurant_id: RestaurantId,
        name: String,
        description: Option<String>,
        price: Money,
        stock: u32,
        is_available: bool,
        version: u64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            restaurant_id,
            name,
            description,
            price,
            stock,
            is_available,
            version,
            created_at,
        }
    }

    /// Decrements stock, rejecting the whole request on underflow.
    pub fn decrease_stock(&mut self, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        if self.stock < quantity {
            return Err(DomainError::InsufficientStock {
                available: self.stock,
                requested: quantity,
            });
        }
        self.stock -= quantity;
        self.version += 1;
        Ok(())
    }

    /// Restores stock (order cancellation).
    pub fn restore_stock(&mut self, quantity: u32) {
        self.stock += quantity;
        self.version += 1;
    }

    /// Sets the customer-facing description.
    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    /// Soft-disables the item.
    pub fn disable(&mut self) {
        self.is_available = false;
    }

    pub fn id(&self) -> MenuItemId {
        self.id
    }

    pub fn restaurant_id(&self) -> RestaurantId {
        self.restaurant_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn stock(&self) -> u32 {
        self.stock
    }

    pub fn is_available(&self) -> bool {
        self.is_available
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(stock: u32) -> MenuItem {
        MenuItem::new(
            RestaurantId::new(),
            "Bibimbap",
            Money::from_minor(11000),
            stock,
        )
    }

    #[test]
    fn decrease_within_stock() {
        let mut menu_item = item(10);
        menu_item.decrease_stock(3).unwrap();
        assert_eq!(menu_item.stock(), 7);
    }

    #[test]
    fn decrease_bumps_version() {
        let mut menu_item = item(10);
        let v0 = menu_item.version();
        menu_item.decrease_stock(1).unwrap();
        assert_eq!(menu_item.version(), v0 + 1);
    }

    #[test]
    fn underflow_rejected_without_partial_effect() {
        let mut menu_item = item(2);
        let result = menu_item.decrease_stock(3);
        assert_eq!(
            result,
            Err(DomainError::InsufficientStock {
                available: 2,
                requested: 3,
            })
        );
        assert_eq!(menu_item.stock(), 2);
    }

    #[test]
    fn exact_decrement_reaches_zero() {
        let mut menu_item = item(5);
        menu_item.decrease_stock(5).unwrap();
        assert_eq!(menu_item.stock(), 0);
        assert!(menu_item.decrease_stock(1).is_err());
    }

    #[test]
    fn zero_quantity_rejected() {
        let mut menu_item = item(5);
        assert!(matches!(
            menu_item.decrease_stock(0),
            Err(DomainError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn restore_stock_adds_back() {
        let mut menu_item = item(5);
        menu_item.decrease_stock(3).unwrap();
        menu_item.restore_stock(3);
        assert_eq!(menu_item.stock(), 5);
    }

    #[test]
    fn disable_soft_deletes() {
        let mut menu_item = item(5);
        assert!(menu_item.is_available());
        menu_item.disable();
        assert!(!menu_item.is_available());
    }
}
