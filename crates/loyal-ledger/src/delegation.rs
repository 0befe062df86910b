//! Delegation manager transitions
//!
//! Pure functions over [`LedgerState`]: each checks its preconditions and
//! either applies the whole transition or returns an error leaving the state
//! untouched.
//!
//! - `delegate`: `BaseResident` → `Delegated(validator)`, requested on base
//! - `commit`: copy rollup state to base, residency unchanged, requested on the holding rollup
//! - `undelegate`: commit, drop the rollup copy, `Delegated` → `BaseResident`
//! - `run_scheduled_commits`: periodic checkpoints driven by the clock

use loyal_core::{Address, LoyalError, ProgramId, Result, ValidatorId};
use serde::{Deserialize, Serialize};

use crate::state::LedgerState;
use crate::venue::{DelegationRecord, Venue};

/// Caller-supplied delegation options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateConfig {
    /// Validator to delegate to; the lowest-latency one when absent
    pub validator: Option<ValidatorId>,
    /// Checkpoint interval; the configured default when absent
    pub commit_frequency_ms: Option<u64>,
}

impl DelegateConfig {
    /// Delegate to a specific validator
    pub fn to_validator(validator: ValidatorId) -> Self {
        Self {
            validator: Some(validator),
            commit_frequency_ms: None,
        }
    }

    /// Set the checkpoint interval
    pub fn with_commit_frequency(mut self, commit_frequency_ms: u64) -> Self {
        self.commit_frequency_ms = Some(commit_frequency_ms);
        self
    }
}

impl LedgerState {
    /// Move write authority for `address` to `validator`.
    ///
    /// Preconditions:
    /// - requested on the base venue
    /// - account exists on base and is `BaseResident`
    /// - validator is known
    pub(crate) fn delegate(
        &mut self,
        venue: &Venue,
        address: Address,
        program_id: ProgramId,
        validator: ValidatorId,
        commit_frequency_ms: u64,
    ) -> Result<DelegationRecord> {
        if *venue != Venue::Base {
            return Err(LoyalError::invalid_delegation_state(format!(
                "delegation of {} must be requested on the base layer, not {venue}",
                address.short()
            )));
        }
        if let Some(existing) = self.delegations.get(&address) {
            return Err(LoyalError::invalid_delegation_state(format!(
                "account {} is already delegated to {}",
                address.short(),
                existing.validator
            )));
        }
        let account = self
            .base
            .get(&address)
            .cloned()
            .ok_or(LoyalError::AccountNotFound { address })?;
        let rollup = self
            .rollups
            .get_mut(&validator)
            .ok_or(LoyalError::UnknownValidator { validator })?;

        rollup.insert(address, account);
        let record = DelegationRecord {
            validator,
            commit_frequency_ms,
            delegated_at_ms: self.now_ms,
            last_commit_ms: self.now_ms,
            program_id,
        };
        self.delegations.insert(address, record);

        tracing::info!(
            account = %address.short(),
            %validator,
            commit_frequency_ms,
            "account delegated"
        );
        Ok(record)
    }

    fn holding_record(&self, venue: &Venue, address: &Address) -> Result<DelegationRecord> {
        let record = *self.delegations.get(address).ok_or_else(|| {
            LoyalError::invalid_delegation_state(format!(
                "account {} is base-resident",
                address.short()
            ))
        })?;
        if *venue != Venue::Rollup(record.validator) {
            return Err(LoyalError::invalid_delegation_state(format!(
                "account {} is delegated to {}; {venue} does not hold it",
                address.short(),
                record.validator
            )));
        }
        Ok(record)
    }

    fn checkpoint(&mut self, address: &Address, validator: &ValidatorId) -> Result<()> {
        let latest = self
            .rollups
            .get(validator)
            .and_then(|store| store.get(address))
            .cloned()
            .ok_or(LoyalError::AccountNotFound { address: *address })?;
        self.base.insert(*address, latest);
        if let Some(record) = self.delegations.get_mut(address) {
            record.last_commit_ms = self.now_ms;
        }
        Ok(())
    }

    /// Checkpoint the rollup copy of `address` to base without changing residency.
    pub(crate) fn commit(&mut self, venue: &Venue, address: Address) -> Result<ValidatorId> {
        let record = self.holding_record(venue, &address)?;
        self.checkpoint(&address, &record.validator)?;
        tracing::debug!(account = %address.short(), validator = %record.validator, "account committed");
        Ok(record.validator)
    }

    /// Reconcile the rollup copy back to base and return authority to base.
    pub(crate) fn undelegate(&mut self, venue: &Venue, address: Address) -> Result<ValidatorId> {
        let record = self.holding_record(venue, &address)?;
        self.checkpoint(&address, &record.validator)?;
        if let Some(store) = self.rollups.get_mut(&record.validator) {
            store.remove(&address);
        }
        self.delegations.remove(&address);
        tracing::info!(account = %address.short(), validator = %record.validator, "account undelegated");
        Ok(record.validator)
    }

    /// Checkpoint every delegated account whose commit interval has elapsed.
    ///
    /// Returns the checkpointed accounts with their validator and owning program.
    pub(crate) fn run_scheduled_commits(&mut self) -> Vec<(Address, ValidatorId, ProgramId)> {
        let now = self.now_ms;
        let due: Vec<(Address, DelegationRecord)> = self
            .delegations
            .iter()
            .filter(|(_, record)| record.checkpoint_due(now))
            .map(|(address, record)| (*address, *record))
            .collect();

        let mut committed = Vec::with_capacity(due.len());
        for (address, record) in due {
            match self.checkpoint(&address, &record.validator) {
                Ok(()) => committed.push((address, record.validator, record.program_id)),
                Err(err) => tracing::warn!(account = %address.short(), %err, "scheduled commit failed"),
            }
        }
        committed
    }
}
