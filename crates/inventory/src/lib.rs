//! Stock decrement strategies.
//!
//! Two sanctioned strategies guard the shared stock counter:
//! [`ExclusiveRowDecrementer`] (row-locked read-modify-write inside the
//! store) and [`DistributedLockDecrementer`] (a named lease-based lock
//! held across a plain guarded decrement). [`UnsafeDecrementer`] is the
//! deliberately unguarded read-then-write baseline kept for negative
//! testing only.

mod error;
mod lock;
mod strategy;

pub use error::{InventoryError, Result};
pub use lock::{DistributedLock, InMemoryLockService, LockConfig, LockToken};
pub use strategy::{
    DistributedLockDecrementer, ExclusiveRowDecrementer, StockDecrementer, StockStrategy,
    UnsafeDecrementer, stock_lock_key,
};
