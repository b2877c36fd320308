//! `mercato-catalog`: the authoritative product store.
//!
//! Sellers list priced, quantity-limited products; every other component
//! reads (and some conditionally mutate) this catalog. Seller edits that
//! shrink stock, raise the minimum order quantity, or delete a product are
//! reported as [`CatalogChange`]s and pushed synchronously to attached
//! observers so dependent state (carts) can be corrected.

pub mod product;
pub mod service;

pub use product::{Product, ProductDraft, ProductPatch, Review};
pub use service::{CatalogChange, CatalogObserver, ProductCatalog, nearest_first};
