//! Guard decision vocabulary
//!
//! Shared allow/deny result types so that every program reports
//! authorization failures the same way.

use loyal_core::{Address, LoyalError};
use serde::{Deserialize, Serialize};

/// Structured guard violation reasons.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardViolation {
    /// Caller is not the registered owner
    NotOwner { caller: Address, owner: Address },
    /// Caller is not the trusted oracle signer
    NotOracleSigner { caller: Address },
    /// Caller is neither the owner nor the oracle signer
    NeitherOwnerNorOracle { caller: Address, owner: Address },
    /// Owner role required but the account records no owner
    NoRegisteredOwner,
}

impl std::fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardViolation::NotOwner { caller, owner } => {
                write!(f, "caller {} is not the owner {}", caller.short(), owner.short())
            }
            GuardViolation::NotOracleSigner { caller } => {
                write!(f, "caller {} is not the oracle signer", caller.short())
            }
            GuardViolation::NeitherOwnerNorOracle { caller, owner } => write!(
                f,
                "caller {} is neither the owner {} nor the oracle signer",
                caller.short(),
                owner.short()
            ),
            GuardViolation::NoRegisteredOwner => write!(f, "account has no registered owner"),
        }
    }
}

/// Decision from guard evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GuardDecision {
    /// Operation is allowed.
    Allow,
    /// Operation is denied with a reason.
    Deny { reason: GuardViolation },
}

impl GuardDecision {
    /// Create an allow decision.
    pub fn allow() -> Self {
        Self::Allow
    }

    /// Create a deny decision with a reason.
    pub fn deny(reason: GuardViolation) -> Self {
        Self::Deny { reason }
    }

    /// Returns `true` if the decision allows the operation.
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Returns `true` if the decision denies the operation.
    pub fn is_denied(&self) -> bool {
        !self.is_allowed()
    }

    /// Returns the denial reason, if denied.
    pub fn denial_reason(&self) -> Option<&GuardViolation> {
        match self {
            Self::Allow => None,
            Self::Deny { reason } => Some(reason),
        }
    }

    /// Convert into the request outcome
    pub fn into_result(self) -> loyal_core::Result<()> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny { reason } => Err(LoyalError::unauthorized(reason.to_string())),
        }
    }
}
