//! Fire-and-forget notification hand-off.
//!
//! Dispatch represents handing an event to a queue for asynchronous
//! delivery. Callers never block on delivery and never fail an order or
//! payment because a notification could not be handed off.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, RestaurantId};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// Events handed off after the triggering state change is durable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    OrderPlaced {
        order_id: OrderId,
        customer_id: CustomerId,
        restaurant_id: RestaurantId,
        total_amount: Money,
        timestamp: DateTime<Utc>,
    },
    PaymentSettled {
        order_id: OrderId,
        customer_id: CustomerId,
        restaurant_id: RestaurantId,
        total_amount: Money,
        timestamp: DateTime<Utc>,
    },
}

impl NotificationEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            NotificationEvent::OrderPlaced { order_id, .. }
            | NotificationEvent::PaymentSettled { order_id, .. } => *order_id,
        }
    }
}

/// Hand-off failure. Logged by callers, never propagated.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("notification channel closed")]
    ChannelClosed,
}

/// Hands notification events to an asynchronous delivery mechanism.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, event: NotificationEvent) -> Result<(), DispatchError>;
}

/// Dispatcher backed by an unbounded channel, so hand-off never applies
/// backpressure to the caller.
#[derive(Clone)]
pub struct ChannelNotificationDispatcher {
    tx: mpsc::UnboundedSender<NotificationEvent>,
}

impl ChannelNotificationDispatcher {
    /// Creates the dispatcher and the receiving end a consumer drains.
    pub fn pair() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl NotificationDispatcher for ChannelNotificationDispatcher {
    async fn dispatch(&self, event: NotificationEvent) -> Result<(), DispatchError> {
        metrics::counter!("notifications_dispatched_total").increment(1);
        self.tx
            .send(event)
            .map_err(|_| DispatchError::ChannelClosed)
    }
}

/// Dispatcher that drops every event. For wiring where notifications
/// are irrelevant.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDispatcher;

#[async_trait]
impl NotificationDispatcher for NoopDispatcher {
    async fn dispatch(&self, _event: NotificationEvent) -> Result<(), DispatchError> {
        Ok(())
    }
}
