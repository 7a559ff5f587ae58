//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;
use crate::payment::PaymentStatus;

/// Errors raised by domain entities when a rule is violated.
///
/// These are definitive business-rule failures: they are never retried
/// and always leave the entity unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// The requested order status transition is not in the transition table.
    #[error("cannot transition order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// A stock decrement would drive the stock counter negative.
    #[error("insufficient stock: {available} available, {requested} requested")]
    InsufficientStock { available: u32, requested: u32 },

    /// An order item quantity must be a positive integer.
    #[error("invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    /// An order must contain at least one item.
    #[error("order has no items")]
    EmptyOrder,

    /// A line total or order total would exceed the representable range.
    #[error("amount exceeds the representable money range")]
    AmountOverflow,

    /// The menu item has been soft-disabled and cannot be ordered.
    #[error("menu item '{name}' is not available")]
    MenuItemUnavailable { name: String },

    /// A payment may settle (success or failure) at most once.
    #[error("payment already settled with status {status}")]
    PaymentAlreadySettled { status: PaymentStatus },

    /// Only a successful payment can be refunded.
    #[error("cannot refund payment in status {status}")]
    InvalidRefund { status: PaymentStatus },
}
