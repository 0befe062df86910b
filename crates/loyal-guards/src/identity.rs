//! The trusted-signer record
//!
//! Each program keeps one `Identity` account at the `["identity"]` derived
//! address. It is written once at initialization from configuration and
//! read by every authorization check afterwards.

use loyal_core::{AccountState, Address};
use serde::{Deserialize, Serialize};

use crate::guard::AuthorizationGuard;

/// Seed of the identity singleton
pub const IDENTITY_SEED: &[u8] = b"identity";

/// Singleton record naming the oracle signer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Off-ledger signer trusted to deliver responses
    pub oracle_signer: Address,
}

impl AccountState for Identity {
    const NAME: &'static str = "Identity";
}

impl Identity {
    /// Record trusting `oracle_signer`
    pub fn new(oracle_signer: Address) -> Self {
        Self { oracle_signer }
    }

    /// Guard built from this record
    pub fn guard(&self) -> AuthorizationGuard {
        AuthorizationGuard::new(self.oracle_signer)
    }
}
