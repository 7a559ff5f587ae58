//! Domain layer: entities and state machines for the order core.
//!
//! Everything here is pure and synchronous. Persistence lives in the
//! `store` crate; every state mutation is an explicit method call that
//! either returns the new state or a typed error. There is no implicit
//! save-on-mutation.

mod error;
mod menu;
pub mod order;
mod payment;

pub use error::DomainError;
pub use menu::MenuItem;
pub use order::{Order, OrderItem, OrderStatus};
pub use payment::{Payment, PaymentStatus};
