//! Checkout error types and the propagation policy.
//!
//! Transient faults are absorbed inside the orchestrators up to their
//! bounds and only then surfaced; business rule violations surface
//! immediately; an idempotent replay is a success, not an error.

use domain::DomainError;
use inventory::InventoryError;
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by the checkout services.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A business rule rejected the request. Not retriable.
    #[error("{0}")]
    Business(String),

    /// A transient condition rejected the request. Retrying later may
    /// succeed; nothing was mutated.
    #[error("{0}")]
    Retriable(String),

    /// Domain rule violation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage failure.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CheckoutError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => CheckoutError::NotFound { entity, id },
            StoreError::Domain(e) => CheckoutError::Domain(e),
            other => CheckoutError::Store(other),
        }
    }
}

impl From<InventoryError> for CheckoutError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::LockTimeout { key } => {
                CheckoutError::Retriable(format!("stock lock busy: {key}"))
            }
            InventoryError::Domain(e) => CheckoutError::Domain(e),
            InventoryError::Store(e) => e.into(),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
