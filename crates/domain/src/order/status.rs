//! Order status state machine.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of an order in its lifecycle.
///
/// Allowed transitions:
/// ```text
/// Pending ──► Paid ──► Preparing ──► Delivering ──► Completed
///    │          │          │
///    └──────────┴──────────┴──► Cancelled
/// ```
///
/// `Cancelled` is not reachable from `Delivering` or `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Order created, payment not yet made.
    #[default]
    Pending,

    /// Payment confirmed.
    Paid,

    /// Restaurant is preparing the order.
    Preparing,

    /// Order is out for delivery.
    Delivering,

    /// Order delivered (terminal state).
    Completed,

    /// Order was cancelled (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if the transition to `next` is allowed.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match next {
            Paid => *self == Pending,
            Preparing => *self == Paid,
            Delivering => *self == Preparing,
            Completed => *self == Delivering,
            Cancelled => !matches!(self, Delivering | Completed | Cancelled),
            Pending => false,
        }
    }

    /// Validates the transition to `next`, returning the new status.
    pub fn transition_to(&self, next: OrderStatus) -> Result<OrderStatus, DomainError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidTransition {
                from: *self,
                to: next,
            })
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Paid => "PAID",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Delivering => "DELIVERING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "PAID" => Ok(OrderStatus::Paid),
            "PREPARING" => Ok(OrderStatus::Preparing),
            "DELIVERING" => Ok(OrderStatus::Delivering),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}
