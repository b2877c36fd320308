//! `mercato-core`: marketplace domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod geo;
pub mod id;
pub mod identity;

pub use error::{DomainError, DomainResult};
pub use geo::{GeoPoint, distance_km};
pub use id::{OrderId, ProductId, UserId};
pub use identity::{IdentityProvider, Principal, Role, StaticIdentity};
