//! `mercato-orders`: placed orders and per-seller fulfillment.
//!
//! An order is immutable once placed except for its per-seller fulfillment
//! statuses, which only ever move forward. Revenue is recognized on delivery
//! and nowhere earlier.

pub mod order;
pub mod tracker;

pub use order::{FulfillmentStatus, Order, OrderItem, OrderProgress, PaymentRef};
pub use tracker::{OrderStatusTracker, SellerOrderView};
