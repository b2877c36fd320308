//! Identity boundary: who is acting.
//!
//! The core never manages credentials. An external identity collaborator
//! resolves the current session to a [`Principal`]; everything downstream
//! takes principals (or bare ids) as inputs.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::UserId;

/// Marketplace role of a participant.
///
/// Roles drive marketplace segmentation only (which listings a viewer is
/// shown); they carry no permission semantics beyond that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Wholesaler,
    Retailer,
    Consumer,
}

impl Role {
    /// Whether this role may list products for sale.
    pub fn can_sell(&self) -> bool {
        !matches!(self, Role::Consumer)
    }
}

/// A resolved actor identity at the domain boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: UserId,
    pub display_name: String,
    pub role: Role,
}

impl Principal {
    pub fn new(id: UserId, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            role,
        }
    }
}

/// External identity collaborator.
///
/// Implementations resolve the current session; an unreachable provider
/// surfaces [`DomainError::Unavailable`] and nothing downstream mutates.
pub trait IdentityProvider: Send + Sync {
    fn current(&self) -> Result<Principal, DomainError>;
}

/// Fixed-identity provider for tests and single-actor tools.
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    principal: Principal,
}

impl StaticIdentity {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current(&self) -> Result<Principal, DomainError> {
        Ok(self.principal.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_identity_returns_its_principal() {
        let principal = Principal::new(UserId::new(), "Asha Traders", Role::Wholesaler);
        let provider = StaticIdentity::new(principal.clone());
        assert_eq!(provider.current().unwrap(), principal);
    }

    #[test]
    fn consumers_cannot_sell() {
        assert!(Role::Wholesaler.can_sell());
        assert!(Role::Retailer.can_sell());
        assert!(!Role::Consumer.can_sell());
    }
}
