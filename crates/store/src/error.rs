//! Storage error types.

use common::{OrderId, PaymentId};
use domain::DomainError;
use thiserror::Error;

/// Errors raised by the repository layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An order with the same idempotency key already exists.
    ///
    /// Carries the winner's id so the caller can return the existing
    /// order instead of surfacing an error.
    #[error("order with idempotency key already exists: {existing}")]
    DuplicateOrderKey { existing: OrderId },

    /// A payment with the same idempotency key already exists.
    #[error("payment with idempotency key already exists: {existing}")]
    DuplicatePaymentKey { existing: PaymentId },

    /// The order already has a payment row (one payment per order).
    #[error("order already has a payment: {existing}")]
    DuplicateOrderPayment { existing: PaymentId },

    /// A domain rule was violated while applying the mutation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Convenience type alias for repository results.
pub type Result<T> = std::result::Result<T, StoreError>;

impl StoreError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
