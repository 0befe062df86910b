//! Loyal Inference - turn-based chat program
//!
//! A user and an off-ledger model take turns writing into a per-user
//! [`Chat`] account. The user writes with `message_in`; the oracle signer
//! recorded in the program's [`loyal_guards::Identity`] answers with
//! `message_out`. The chat can be delegated to a rollup for low-latency
//! turns and reconciled back later.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Instruction builders and account addresses
pub mod instruction;

/// Entry points
pub mod processor;

/// Chat record and transitions
pub mod state;

pub use instruction::{chat_address, id, identity_address};
pub use processor::ChatProgram;
pub use state::{Chat, ChatPhase};
