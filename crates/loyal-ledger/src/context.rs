//! Per-instruction execution context
//!
//! Programs see the ledger only through this context. It enforces the
//! settlement-layer rules a program cannot opt out of:
//! - accounts must be passed in the instruction's account list
//! - only writable accounts owned by the running program may be written
//! - accounts may only be created on the base venue
//! - writes require the venue to hold write authority
//! - signer privileges flow into cross-program invocations, never beyond

use loyal_core::{
    create_program_address, AccountMeta, AccountState, Address, Instruction, LoyalConfig,
    LoyalError, ProgramEvent, ProgramId, Result,
};
use std::collections::BTreeSet;

use crate::delegation::DelegateConfig;
use crate::events::LedgerEvent;
use crate::program::ProgramRegistry;
use crate::state::LedgerState;
use crate::store::StoredAccount;
use crate::venue::{DelegationRecord, Residency, Venue};

/// Execution context handed to [`crate::Program::process`]
pub struct InvokeContext<'a> {
    state: &'a mut LedgerState,
    events: &'a mut Vec<LedgerEvent>,
    registry: &'a ProgramRegistry,
    config: &'a LoyalConfig,
    venue: Venue,
    program_id: ProgramId,
    accounts: Vec<AccountMeta>,
    signers: BTreeSet<Address>,
    depth: usize,
}

impl<'a> InvokeContext<'a> {
    pub(crate) fn new(
        state: &'a mut LedgerState,
        events: &'a mut Vec<LedgerEvent>,
        registry: &'a ProgramRegistry,
        config: &'a LoyalConfig,
        venue: Venue,
        instruction: &Instruction,
        signers: BTreeSet<Address>,
    ) -> Self {
        Self {
            state,
            events,
            registry,
            config,
            venue,
            program_id: instruction.program_id,
            accounts: instruction.accounts.clone(),
            signers,
            depth: 1,
        }
    }

    /// Running program
    pub fn program_id(&self) -> ProgramId {
        self.program_id
    }

    /// Venue executing the transaction
    pub fn venue(&self) -> Venue {
        self.venue
    }

    /// Current slot
    pub fn slot(&self) -> u64 {
        self.state.slot()
    }

    /// Current ledger time
    pub fn now_ms(&self) -> u64 {
        self.state.now_ms()
    }

    /// Harness configuration
    pub fn config(&self) -> &LoyalConfig {
        self.config
    }

    /// Nesting depth, 1 for top-level instructions
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Accounts passed to this instruction
    pub fn accounts(&self) -> &[AccountMeta] {
        &self.accounts
    }

    /// Account at `index`, failing if the caller passed too few
    pub fn account(&self, index: usize) -> Result<AccountMeta> {
        self.accounts.get(index).copied().ok_or_else(|| {
            LoyalError::invalid_account_data(format!(
                "missing account #{index}; {} passed",
                self.accounts.len()
            ))
        })
    }

    /// Accounts from `start` on
    pub fn remaining_accounts(&self, start: usize) -> &[AccountMeta] {
        self.accounts.get(start..).unwrap_or(&[])
    }

    /// Whether `address` signed this invocation
    pub fn is_signer(&self, address: &Address) -> bool {
        self.signers.contains(address)
    }

    /// Fail with `MissingSigner` unless `address` signed
    pub fn require_signer(&self, address: &Address) -> Result<()> {
        if self.is_signer(address) {
            Ok(())
        } else {
            Err(LoyalError::MissingSigner { address: *address })
        }
    }

    fn meta(&self, address: &Address) -> Result<&AccountMeta> {
        self.accounts
            .iter()
            .find(|meta| meta.address == *address)
            .ok_or_else(|| {
                LoyalError::invalid_account_data(format!(
                    "account {} not passed to instruction",
                    address.short()
                ))
            })
    }

    fn require_writable(&self, address: &Address) -> Result<()> {
        if self.meta(address)?.is_writable {
            Ok(())
        } else {
            Err(LoyalError::invalid_account_data(format!(
                "account {} is not writable",
                address.short()
            )))
        }
    }

    /// Whether an account exists on this venue
    pub fn exists(&self, address: &Address) -> bool {
        self.state.read(&self.venue, address).is_some()
    }

    /// Residency of an account
    pub fn residency(&self, address: &Address) -> Residency {
        self.state.residency(address)
    }

    /// Owning program of an existing account
    pub fn owner_of(&self, address: &Address) -> Result<ProgramId> {
        self.state
            .read(&self.venue, address)
            .map(|account| account.owner)
            .ok_or(LoyalError::AccountNotFound { address: *address })
    }

    /// Load a record owned by the running program
    pub fn load<T: AccountState>(&self, address: &Address) -> Result<T> {
        self.load_owned_by(address, &self.program_id)
    }

    /// Load a record owned by `owner`
    pub fn load_owned_by<T: AccountState>(&self, address: &Address, owner: &ProgramId) -> Result<T> {
        self.meta(address)?;
        let account = self
            .state
            .read(&self.venue, address)
            .ok_or(LoyalError::AccountNotFound { address: *address })?;
        if account.owner != *owner {
            return Err(LoyalError::invalid_account_data(format!(
                "account {} is not owned by the expected program",
                address.short()
            )));
        }
        T::try_deserialize(&account.data)
    }

    /// Load a record owned by the running program if it exists
    pub fn try_load<T: AccountState>(&self, address: &Address) -> Result<Option<T>> {
        if self.exists(address) {
            self.load(address).map(Some)
        } else {
            self.meta(address)?;
            Ok(None)
        }
    }

    /// Create a new account owned by the running program
    pub fn init<T: AccountState>(&mut self, address: &Address, value: &T) -> Result<()> {
        self.require_writable(address)?;
        if self.venue != Venue::Base {
            return Err(LoyalError::invalid_delegation_state(format!(
                "account {} can only be created on the base layer, not {}",
                address.short(),
                self.venue
            )));
        }
        if self.exists(address) {
            return Err(LoyalError::AlreadyInitialized { address: *address });
        }
        let account = StoredAccount::new(self.program_id, value.try_serialize()?);
        self.state.write(&self.venue, *address, account)?;
        tracing::debug!(account = %address.short(), kind = T::NAME, "account created");
        Ok(())
    }

    /// Overwrite an existing account owned by the running program
    pub fn store<T: AccountState>(&mut self, address: &Address, value: &T) -> Result<()> {
        self.require_writable(address)?;
        let owner = self.owner_of(address)?;
        if owner != self.program_id {
            return Err(LoyalError::invalid_account_data(format!(
                "account {} is owned by another program",
                address.short()
            )));
        }
        let account = StoredAccount::new(self.program_id, value.try_serialize()?);
        self.state.write(&self.venue, *address, account)
    }

    /// Record an event, published once the transaction commits
    pub fn emit(&mut self, event: ProgramEvent) {
        tracing::debug!(kind = event.kind(), "event emitted");
        self.events.push(LedgerEvent {
            slot: self.state.slot(),
            venue: self.venue,
            program_id: self.program_id,
            event,
        });
    }

    /// Invoke another program with the current signers
    pub fn invoke(&mut self, instruction: &Instruction) -> Result<()> {
        self.invoke_signed(instruction, &[])
    }

    /// Invoke another program, additionally signing for the running
    /// program's derived addresses built from `signer_seeds`
    pub fn invoke_signed(&mut self, instruction: &Instruction, signer_seeds: &[&[&[u8]]]) -> Result<()> {
        let max = self.config.ledger.max_cpi_depth;
        if self.depth + 1 > max {
            return Err(LoyalError::CallDepthExceeded {
                depth: self.depth + 1,
                max,
            });
        }

        let mut available = self.signers.clone();
        for seeds in signer_seeds {
            available.insert(create_program_address(seeds, &self.program_id)?);
        }

        let mut signers = BTreeSet::new();
        for meta in &instruction.accounts {
            let outer = self.meta(&meta.address).map_err(|_| {
                LoyalError::invalid_account_data(format!(
                    "account {} not available to the invoked program",
                    meta.address.short()
                ))
            })?;
            if meta.is_writable && !outer.is_writable {
                return Err(LoyalError::invalid_account_data(format!(
                    "writable privilege escalated for {}",
                    meta.address.short()
                )));
            }
            if meta.is_signer {
                if !available.contains(&meta.address) {
                    return Err(LoyalError::MissingSigner {
                        address: meta.address,
                    });
                }
                signers.insert(meta.address);
            }
        }

        let (program, entry) = self
            .registry
            .resolve(&instruction.program_id, &instruction.discriminator)?;

        tracing::debug!(
            caller = %self.program_id.short(),
            callee = program.name(),
            entry = entry.name,
            depth = self.depth + 1,
            "cross-program invocation"
        );

        let mut child = InvokeContext {
            state: &mut *self.state,
            events: &mut *self.events,
            registry: self.registry,
            config: self.config,
            venue: self.venue,
            program_id: instruction.program_id,
            accounts: instruction.accounts.clone(),
            signers,
            depth: self.depth + 1,
        };
        program.process(&mut child, &entry, instruction)
    }

    fn require_own_writable(&self, address: &Address) -> Result<()> {
        self.require_writable(address)?;
        if self.owner_of(address)? != self.program_id {
            return Err(LoyalError::invalid_account_data(format!(
                "account {} is owned by another program",
                address.short()
            )));
        }
        Ok(())
    }

    /// Move write authority over an owned account to a rollup validator
    pub fn delegate_account(
        &mut self,
        address: &Address,
        options: DelegateConfig,
    ) -> Result<DelegationRecord> {
        self.require_own_writable(address)?;

        let validator = match options.validator {
            Some(validator) => validator,
            None => self
                .config
                .fastest_validator()
                .map(|v| v.id())
                .ok_or_else(|| LoyalError::config("no rollup validators configured"))?,
        };
        if !self.config.ledger.validators.iter().any(|v| v.id() == validator) {
            return Err(LoyalError::UnknownValidator { validator });
        }
        let commit_frequency_ms = options
            .commit_frequency_ms
            .unwrap_or(self.config.delegation.default_commit_frequency_ms);

        let record = self.state.delegate(
            &self.venue,
            *address,
            self.program_id,
            validator,
            commit_frequency_ms,
        )?;
        self.emit(ProgramEvent::Delegated {
            account: *address,
            validator,
            commit_frequency_ms,
        });
        Ok(record)
    }

    /// Checkpoint a delegated account to the base layer
    pub fn commit_account(&mut self, address: &Address) -> Result<()> {
        self.require_own_writable(address)?;
        let validator = self.state.commit(&self.venue, *address)?;
        self.emit(ProgramEvent::Committed {
            account: *address,
            validator,
        });
        Ok(())
    }

    /// Commit a delegated account and return write authority to base
    pub fn undelegate_account(&mut self, address: &Address) -> Result<()> {
        self.require_own_writable(address)?;
        let validator = self.state.undelegate(&self.venue, *address)?;
        self.emit(ProgramEvent::Undelegated {
            account: *address,
            validator,
        });
        Ok(())
    }
}
