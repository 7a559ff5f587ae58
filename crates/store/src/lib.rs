//! Repository layer for the food-ordering core.
//!
//! Two interchangeable backends implement the same repository traits:
//! [`InMemoryStore`] for tests and demos, and [`PostgresStore`] for
//! production. Idempotency-key uniqueness is enforced here, at the
//! storage layer, so two concurrent creations with the same key resolve
//! to exactly one winner rather than by a check-then-insert in application code.

mod error;
mod memory;
mod postgres;
mod repository;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{MenuItemRepository, OrderRepository, PaymentRepository, UnsafeStockAccess};
