//! Loyal Core - shared vocabulary for the chat and oracle programs
//!
//! This crate holds the pieces every other crate agrees on and nothing that
//! executes: identifiers and program-derived addresses, the on-ledger record
//! encoding, instructions, events, errors, and configuration.
//!
//! # Layers
//!
//! - `loyal-core` (this crate): types only
//! - `loyal-guards`: who may mutate what
//! - `loyal-ledger`: settlement layer harness (store, venues, delegation, events)
//! - `loyal-inference`, `loyal-oracle`, `loyal-agent`: programs
//! - `loyal-testkit`: fixtures and the off-ledger responder

#![forbid(unsafe_code)]

/// Account record encoding
pub mod account;

/// Harness and program configuration
pub mod config;

/// Program-derived address computation
pub mod derivation;

/// Unified error handling
pub mod errors;

/// Program events
pub mod events;

/// Addresses, validator ids, discriminators
pub mod identifiers;

/// Instructions and account metas
pub mod instruction;

/// Signing key pairs
pub mod keypair;

pub use account::AccountState;
pub use config::{EditPolicy, LoyalConfig, ValidatorConfig};
pub use derivation::{create_program_address, find_program_address};
pub use errors::{LoyalError, Result};
pub use events::{InteractionStatus, ProgramEvent};
pub use identifiers::{Address, Discriminator, ProgramId, ValidatorId};
pub use instruction::{AccountMeta, Instruction};
pub use keypair::{verify_signature, Keypair, Signature};
