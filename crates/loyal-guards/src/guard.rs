//! Owner / oracle-signer authorization

use loyal_core::Address;

use crate::types::{GuardDecision, GuardViolation};

/// Role a caller must hold for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The account's registered owner
    Owner,
    /// The oracle signer recorded in the program's identity record
    OracleSigner,
    /// Either of the above
    Either,
}

/// Guard comparing callers against an owner and the trusted oracle signer
///
/// Constructed from the program's on-ledger identity record for each
/// request, so the trusted signer is always the one recorded at
/// initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationGuard {
    oracle_signer: Address,
}

impl AuthorizationGuard {
    /// Guard trusting `oracle_signer` for callback delivery
    pub fn new(oracle_signer: Address) -> Self {
        Self { oracle_signer }
    }

    /// The trusted oracle signer
    pub fn oracle_signer(&self) -> Address {
        self.oracle_signer
    }

    /// Evaluate whether `caller` holds `role` over an account owned by `owner`.
    pub fn evaluate(&self, caller: &Address, owner: Option<&Address>, role: Role) -> GuardDecision {
        let is_oracle = *caller == self.oracle_signer;
        let decision = match (role, owner) {
            (Role::OracleSigner, _) if is_oracle => GuardDecision::allow(),
            (Role::OracleSigner, _) => {
                GuardDecision::deny(GuardViolation::NotOracleSigner { caller: *caller })
            }
            (Role::Owner | Role::Either, Some(owner)) if caller == owner => GuardDecision::allow(),
            (Role::Either, _) if is_oracle => GuardDecision::allow(),
            (Role::Owner, Some(owner)) => GuardDecision::deny(GuardViolation::NotOwner {
                caller: *caller,
                owner: *owner,
            }),
            (Role::Either, Some(owner)) => {
                GuardDecision::deny(GuardViolation::NeitherOwnerNorOracle {
                    caller: *caller,
                    owner: *owner,
                })
            }
            (Role::Owner | Role::Either, None) => {
                GuardDecision::deny(GuardViolation::NoRegisteredOwner)
            }
        };

        if let Some(reason) = decision.denial_reason() {
            tracing::debug!(?role, %reason, "authorization denied");
        }
        decision
    }

    /// Evaluate and convert a denial into `LoyalError::Unauthorized`
    pub fn authorize(
        &self,
        caller: &Address,
        owner: Option<&Address>,
        role: Role,
    ) -> loyal_core::Result<()> {
        self.evaluate(caller, owner, role).into_result()
    }
}
