//! Shared identifier and value types for the food-ordering core.
//!
//! Every entity identifier is a distinct UUID newtype so that an order id
//! can never be passed where a menu-item id is expected.

mod ids;
mod key;
mod money;

pub use ids::{CustomerId, MenuItemId, OrderId, PaymentId, RestaurantId};
pub use key::IdempotencyKey;
pub use money::Money;
