//! Loyal Ledger - in-process settlement layer with rollup delegation
//!
//! Models the execution environment the Loyal programs run on: a durable
//! base layer, low-latency rollups that accounts can be delegated to, signed
//! atomic transactions, cross-program invocation with derived-address
//! signing, and an event bus for off-ledger listeners.
//!
//! # Execution model
//!
//! Transactions are processed one at a time. Each runs against a staged
//! copy of [`LedgerState`] and replaces it only on success, so a failed
//! instruction never leaves a partial write behind.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Per-instruction execution context
pub mod context;

/// Delegate, commit, undelegate transitions
pub mod delegation;

/// Committed event fan-out
pub mod events;

/// Shared ledger handle
pub mod ledger;

/// Programs and the entry-point registry
pub mod program;

/// Ledger state
pub mod state;

/// Account storage
pub mod store;

/// Signed transactions
pub mod transaction;

/// Venues and residency
pub mod venue;

pub use context::InvokeContext;
pub use delegation::DelegateConfig;
pub use events::{EventBus, LedgerEvent, Subscription, SubscriptionId};
pub use ledger::Ledger;
pub use program::{EntryPoint, Program, ProgramRegistry};
pub use state::LedgerState;
pub use store::{AccountStore, StoredAccount};
pub use transaction::{Transaction, TransactionMessage, TransactionReceipt};
pub use venue::{DelegationRecord, Residency, Venue};
