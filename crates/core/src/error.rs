//! Domain error model.

use thiserror::Error;

use crate::id::ProductId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic business/domain failures. Store-level
/// concerns (lock poisoning, retry exhaustion) live in the store crate and
/// are mapped into this taxonomy at each call site.
///
/// Note that a quantity *correction* (clamping to stock/MOQ) is not an error
/// anywhere in this workspace: it is a successful result whose value differs
/// from the request, and callers must read the returned value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, stale cart line).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// The actor is not allowed to perform this mutation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A stock reservation lost the race; the caller must re-validate
    /// against current stock and retry.
    #[error("stock conflict on product {product_id}")]
    StockConflict { product_id: ProductId },

    /// A review-aggregate write kept colliding past the bounded retry count.
    #[error("review aggregate conflict: {0}")]
    ReviewConflict(String),

    /// A compensating stock release failed after a partial reservation.
    /// Fatal: stock is under-counted until manually reconciled.
    #[error("reservation compensation failed: {0}")]
    CompensationFailure(String),

    /// An external collaborator (store, payment, identity) is unreachable.
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn stock_conflict(product_id: ProductId) -> Self {
        Self::StockConflict { product_id }
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}
