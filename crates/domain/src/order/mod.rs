//! Order aggregate: line items, total computation, status state machine.

mod aggregate;
mod status;

pub use aggregate::{Order, OrderItem};
pub use status::OrderStatus;
