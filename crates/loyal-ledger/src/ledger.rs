//! The in-process settlement layer
//!
//! [`Ledger`] owns the base store, one store per rollup validator, the
//! delegation table and the clock. Transactions are processed one at a
//! time against a staged copy of the state; the copy replaces the live
//! state only when every instruction succeeds, and only then are the
//! emitted events published.

use loyal_core::{AccountState, Address, Instruction, Keypair, LoyalConfig, LoyalError, ProgramEvent, Result};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::context::InvokeContext;
use crate::events::{EventBus, LedgerEvent, Subscription, SubscriptionId};
use crate::program::ProgramRegistry;
use crate::state::LedgerState;
use crate::store::StoredAccount;
use crate::transaction::{Transaction, TransactionReceipt};
use crate::venue::{Residency, Venue};

/// Shared handle to the settlement layer and its rollups
#[derive(Clone)]
pub struct Ledger {
    state: Arc<Mutex<LedgerState>>,
    registry: Arc<ProgramRegistry>,
    config: Arc<LoyalConfig>,
    events: EventBus,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Ledger")
            .field("slot", &state.slot())
            .field("now_ms", &state.now_ms())
            .field("programs", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// Create a ledger for the validated configuration and program set
    pub fn new(config: LoyalConfig, registry: ProgramRegistry) -> Result<Self> {
        config.validate()?;
        let state = LedgerState::new(config.ledger.validators.iter().map(|v| v.id()));
        tracing::info!(
            validators = config.ledger.validators.len(),
            slot_duration_ms = config.ledger.slot_duration_ms,
            "ledger created"
        );
        Ok(Self {
            state: Arc::new(Mutex::new(state)),
            registry: Arc::new(registry),
            config: Arc::new(config),
            events: EventBus::new(),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &LoyalConfig {
        &self.config
    }

    /// Registered programs
    pub fn registry(&self) -> &ProgramRegistry {
        &self.registry
    }

    /// Current slot
    pub fn slot(&self) -> u64 {
        self.state.lock().slot()
    }

    /// Current ledger time
    pub fn now_ms(&self) -> u64 {
        self.state.lock().now_ms()
    }

    /// Sign and process instructions on `venue`
    pub fn send(
        &self,
        venue: Venue,
        instructions: Vec<Instruction>,
        signers: &[&Keypair],
    ) -> Result<TransactionReceipt> {
        let transaction = Transaction::new_signed(venue, instructions, signers)?;
        self.process_transaction(&transaction)
    }

    /// Execute a transaction atomically.
    ///
    /// On failure the live state is untouched and no event is published.
    pub fn process_transaction(&self, transaction: &Transaction) -> Result<TransactionReceipt> {
        let venue = transaction.venue();
        let result = transaction
            .verify()
            .and_then(|signers| self.execute(venue, &transaction.message.instructions, &signers));

        match result {
            Ok(receipt) => {
                tracing::debug!(
                    slot = receipt.slot,
                    %venue,
                    events = receipt.events.len(),
                    "transaction committed"
                );
                self.events.publish(&receipt.events);
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!(%venue, %err, "transaction rejected");
                Err(err)
            }
        }
    }

    fn execute(
        &self,
        venue: Venue,
        instructions: &[Instruction],
        signers: &BTreeSet<Address>,
    ) -> Result<TransactionReceipt> {
        let mut live = self.state.lock();
        if let Venue::Rollup(validator) = venue {
            if !live.has_validator(&validator) {
                return Err(LoyalError::UnknownValidator { validator });
            }
        }

        let mut staged = live.clone();
        staged.advance_slot(self.config.ledger.slot_duration_ms);
        let mut events = Vec::new();

        for instruction in instructions {
            let mut instruction_signers = BTreeSet::new();
            for meta in instruction.accounts.iter().filter(|meta| meta.is_signer) {
                if !signers.contains(&meta.address) {
                    return Err(LoyalError::MissingSigner {
                        address: meta.address,
                    });
                }
                instruction_signers.insert(meta.address);
            }

            let (program, entry) = self
                .registry
                .resolve(&instruction.program_id, &instruction.discriminator)?;
            tracing::trace!(program = program.name(), entry = entry.name, %venue, "dispatching");

            let mut ctx = InvokeContext::new(
                &mut staged,
                &mut events,
                &self.registry,
                &self.config,
                venue,
                instruction,
                instruction_signers,
            );
            program.process(&mut ctx, &entry, instruction)?;
        }

        events.extend(scheduled_commit_events(&mut staged));
        let slot = staged.slot();
        *live = staged;

        Ok(TransactionReceipt {
            slot,
            venue,
            events,
        })
    }

    /// Let `elapsed_ms` of ledger time pass without a transaction, running
    /// any periodic checkpoints that fall due
    pub fn advance_clock(&self, elapsed_ms: u64) -> Vec<LedgerEvent> {
        let events = {
            let mut state = self.state.lock();
            state.now_ms += elapsed_ms;
            scheduled_commit_events(&mut state)
        };
        self.events.publish(&events);
        events
    }

    /// Account as seen from `venue`
    pub fn get_account(&self, venue: Venue, address: &Address) -> Option<StoredAccount> {
        self.state.lock().read(&venue, address).cloned()
    }

    /// Decode the record at `address` as seen from `venue`
    pub fn fetch<T: AccountState>(&self, venue: Venue, address: &Address) -> Result<T> {
        let account = self
            .get_account(venue, address)
            .ok_or(LoyalError::AccountNotFound { address: *address })?;
        T::try_deserialize(&account.data)
    }

    /// Residency of an account
    pub fn residency(&self, address: &Address) -> Residency {
        self.state.lock().residency(address)
    }

    /// Copy of the complete state
    pub fn snapshot(&self) -> LedgerState {
        self.state.lock().clone()
    }

    /// Subscribe to committed events
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// Cancel a subscription
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Event bus shared by every clone of this ledger
    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }
}

fn scheduled_commit_events(state: &mut LedgerState) -> Vec<LedgerEvent> {
    let slot = state.slot();
    state
        .run_scheduled_commits()
        .into_iter()
        .map(|(account, validator, program_id)| LedgerEvent {
            slot,
            venue: Venue::Rollup(validator),
            program_id,
            event: ProgramEvent::Committed { account, validator },
        })
        .collect()
}
