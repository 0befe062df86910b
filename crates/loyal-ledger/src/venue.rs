//! Execution venues and account residency
//!
//! Residency is explicit state carried alongside each account rather than
//! something inferred from which endpoint received a request. Every write
//! pattern-matches on it.

use loyal_core::{ProgramId, ValidatorId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a transaction executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    /// The durable settlement layer
    Base,
    /// A low-latency rollup run by one validator
    Rollup(ValidatorId),
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Base => write!(f, "base"),
            Venue::Rollup(validator) => write!(f, "rollup({validator})"),
        }
    }
}

/// Bookkeeping for an account whose write authority sits on a rollup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationRecord {
    /// Validator holding write authority
    pub validator: ValidatorId,
    /// Periodic checkpoint interval; zero means commit only on request
    pub commit_frequency_ms: u64,
    /// Ledger time of delegation
    pub delegated_at_ms: u64,
    /// Ledger time of the last checkpoint to base
    pub last_commit_ms: u64,
    /// Program that owns the account and requested delegation
    pub program_id: ProgramId,
}

impl DelegationRecord {
    /// Whether a periodic checkpoint is due at `now_ms`
    pub fn checkpoint_due(&self, now_ms: u64) -> bool {
        self.commit_frequency_ms > 0
            && now_ms.saturating_sub(self.last_commit_ms) >= self.commit_frequency_ms
    }
}

/// Which venue holds write authority over an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Residency {
    /// Base layer holds authority
    BaseResident,
    /// A rollup validator holds authority
    Delegated(DelegationRecord),
}

impl Residency {
    /// Whether `venue` may write an account with this residency
    pub fn accepts_writes_from(&self, venue: &Venue) -> bool {
        match (self, venue) {
            (Residency::BaseResident, Venue::Base) => true,
            (Residency::Delegated(record), Venue::Rollup(validator)) => {
                record.validator == *validator
            }
            _ => false,
        }
    }

    /// Whether the account is delegated
    pub fn is_delegated(&self) -> bool {
        matches!(self, Residency::Delegated(_))
    }
}

impl fmt::Display for Residency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Residency::BaseResident => write!(f, "base-resident"),
            Residency::Delegated(record) => write!(f, "delegated to {}", record.validator),
        }
    }
}
