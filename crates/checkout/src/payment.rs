//! Payment collection seam.

use thiserror::Error;
use uuid::Uuid;

use mercato_core::UserId;
use mercato_orders::PaymentRef;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaymentError {
    /// The charge was refused; the buyer can retry with another instrument.
    #[error("payment declined")]
    Declined,

    /// The gateway could not be reached at all.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// Collects a payment and returns the proof the order will carry.
pub trait PaymentGateway: Send + Sync {
    fn collect(&self, buyer_id: UserId, amount: u64) -> Result<PaymentRef, PaymentError>;
}

/// Deterministic gateway for tests and development.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedGateway {
    /// Approve everything, minting a fresh reference per charge.
    Approve,
    /// Decline everything.
    Decline,
    /// Fail as unreachable.
    Offline,
}

impl PaymentGateway for FixedGateway {
    fn collect(&self, buyer_id: UserId, amount: u64) -> Result<PaymentRef, PaymentError> {
        match self {
            FixedGateway::Approve => {
                tracing::debug!("collected {} from buyer {}", amount, buyer_id);
                Ok(PaymentRef::new(format!("pay_{}", Uuid::now_v7().simple())))
            }
            FixedGateway::Decline => Err(PaymentError::Declined),
            FixedGateway::Offline => Err(PaymentError::Unavailable("gateway offline".to_owned())),
        }
    }
}
