//! `mercato-carts`: per-buyer shopping carts.
//!
//! A cart is a set of keyed lines, one per (buyer, seller, product). Every
//! quantity that reaches the store has already been pushed through one pure
//! clamping function, [`authoritative_quantity`], so a persisted line is
//! always either gone or within `[moq, stock]` as of the write. Catalog
//! changes that can invalidate lines are replayed onto carts by
//! [`CartReconciler`].

pub mod cart;
pub mod reconciler;

pub use cart::{
    CartEntry, CartKey, CartLine, CartNotice, CartService, CartView, LineStatus,
    authoritative_quantity,
};
pub use reconciler::{CartAdjustment, CartReconciler};
