//! Inventory error types.

use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors raised by the stock decrement strategies.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// The named lock could not be acquired within the wait bound.
    ///
    /// Retriable: the caller may try again, nothing was mutated.
    #[error("timed out waiting for lock: {key}")]
    LockTimeout { key: String },

    /// A domain rule was violated (insufficient stock, zero quantity).
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience type alias for inventory results.
pub type Result<T> = std::result::Result<T, InventoryError>;
