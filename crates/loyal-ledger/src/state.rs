//! Ledger state: base store, rollup stores, residency, clock
//!
//! A transaction runs against a clone of this state and replaces the
//! original only if every instruction succeeds.

use loyal_core::{Address, LoyalError, Result, ValidatorId};
use std::collections::BTreeMap;

use crate::store::{AccountStore, StoredAccount};
use crate::venue::{DelegationRecord, Residency, Venue};

/// Complete state of the settlement layer and its rollups
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    pub(crate) base: AccountStore,
    pub(crate) rollups: BTreeMap<ValidatorId, AccountStore>,
    pub(crate) delegations: BTreeMap<Address, DelegationRecord>,
    pub(crate) slot: u64,
    pub(crate) now_ms: u64,
}

impl LedgerState {
    /// Empty state with one rollup store per validator
    pub fn new(validators: impl IntoIterator<Item = ValidatorId>) -> Self {
        Self {
            rollups: validators
                .into_iter()
                .map(|validator| (validator, AccountStore::new()))
                .collect(),
            ..Self::default()
        }
    }

    /// Current slot
    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Current ledger time
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Base-layer store
    pub fn base(&self) -> &AccountStore {
        &self.base
    }

    /// Rollup store for a validator
    pub fn rollup(&self, validator: &ValidatorId) -> Option<&AccountStore> {
        self.rollups.get(validator)
    }

    /// Whether the validator is known
    pub fn has_validator(&self, validator: &ValidatorId) -> bool {
        self.rollups.contains_key(validator)
    }

    /// Residency of an account
    pub fn residency(&self, address: &Address) -> Residency {
        match self.delegations.get(address) {
            Some(record) => Residency::Delegated(*record),
            None => Residency::BaseResident,
        }
    }

    /// Read an account as seen from `venue`.
    ///
    /// A rollup sees its own copy of accounts delegated to it and a read-only
    /// view of base state for everything else.
    pub fn read(&self, venue: &Venue, address: &Address) -> Option<&StoredAccount> {
        match venue {
            Venue::Base => self.base.get(address),
            Venue::Rollup(validator) => match self.delegations.get(address) {
                Some(record) if record.validator == *validator => {
                    self.rollups.get(validator).and_then(|store| store.get(address))
                }
                _ => self.base.get(address),
            },
        }
    }

    /// Reject writes from a venue that does not hold authority
    pub fn check_write_authority(&self, venue: &Venue, address: &Address) -> Result<()> {
        let residency = self.residency(address);
        if residency.accepts_writes_from(venue) {
            Ok(())
        } else {
            Err(LoyalError::invalid_delegation_state(format!(
                "account {} is {residency}; {venue} cannot write it",
                address.short()
            )))
        }
    }

    /// Write an account on `venue`, enforcing authority
    pub(crate) fn write(
        &mut self,
        venue: &Venue,
        address: Address,
        account: StoredAccount,
    ) -> Result<()> {
        self.check_write_authority(venue, &address)?;
        match venue {
            Venue::Base => self.base.insert(address, account),
            Venue::Rollup(validator) => self
                .rollups
                .get_mut(validator)
                .ok_or(LoyalError::UnknownValidator {
                    validator: *validator,
                })?
                .insert(address, account),
        }
        Ok(())
    }

    /// Advance the clock by one slot of `slot_duration_ms`
    pub(crate) fn advance_slot(&mut self, slot_duration_ms: u64) {
        self.slot += 1;
        self.now_ms += slot_duration_ms;
    }
}
