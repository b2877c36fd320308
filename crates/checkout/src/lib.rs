//! `mercato-checkout`: cart-to-order conversion.
//!
//! Checkout is the only writer that turns held cart quantities into owned
//! stock. It validates the whole cart against the live catalog, collects
//! payment, reserves stock product by product through conditional writes,
//! and places the order. A reservation that cannot complete is rolled back
//! before the failure is reported; an order is never placed on partially
//! reserved or unpaid stock.

pub mod coordinator;
pub mod payment;

pub use coordinator::{CartIssue, CheckoutCoordinator, CheckoutError, IssueReason};
pub use payment::{FixedGateway, PaymentError, PaymentGateway};
