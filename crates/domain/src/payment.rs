//! Payment entity tied one-to-one to an order.

use chrono::{DateTime, Utc};
use common::{IdempotencyKey, Money, OrderId, PaymentId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// The status of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    /// Payment row created, gateway not yet settled.
    #[default]
    Pending,

    /// Gateway approved the charge.
    Success,

    /// Gateway declined, timed out, or the circuit breaker was open.
    Failed,

    /// A successful payment that was later refunded.
    Refunded,
}

impl PaymentStatus {
    /// Returns true once the gateway outcome has been recorded.
    pub fn is_settled(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// A payment attempt against an external gateway.
///
/// At most one payment exists per order (enforced at the storage layer).
/// A payment settles (success or failure) at most once; refund is a
/// further mutation of a successful payment, not a new row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    order_id: OrderId,
    amount: Money,
    status: PaymentStatus,
    /// Gateway-issued transaction id, present only on success.
    transaction_id: Option<String>,
    idempotency_key: IdempotencyKey,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new pending payment for an order.
    pub fn new(order_id: OrderId, amount: Money, idempotency_key: IdempotencyKey) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            order_id,
            amount,
            status: PaymentStatus::Pending,
            transaction_id: None,
            idempotency_key,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a payment from persisted state.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: PaymentId,
        order_id: OrderId,
        amount: Money,
        status: PaymentStatus,
        transaction_id: Option<String>,
        idempotency_key: IdempotencyKey,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_id,
            amount,
            status,
            transaction_id,
            idempotency_key,
            created_at,
            updated_at,
        }
    }

    /// Records a successful gateway settlement.
    pub fn mark_success(&mut self, transaction_id: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = PaymentStatus::Success;
        self.transaction_id = Some(transaction_id.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Records a failed gateway settlement.
    pub fn mark_failed(&mut self) -> Result<(), DomainError> {
        self.ensure_pending()?;
        self.status = PaymentStatus::Failed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Refunds a successful payment.
    pub fn mark_refunded(&mut self) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Success {
            return Err(DomainError::InvalidRefund {
                status: self.status,
            });
        }
        self.status = PaymentStatus::Refunded;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_pending(&self) -> Result<(), DomainError> {
        if self.status.is_settled() {
            return Err(DomainError::PaymentAlreadySettled {
                status: self.status,
            });
        }
        Ok(())
    }

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
