//! Loyal Oracle - LLM request/response protocol
//!
//! A context owner creates numbered [`Interaction`]s under a
//! [`ContextAccount`]. The trusted oracle signer answers each one with
//! `callback_from_llm`, which stores the (possibly partial) response and
//! forwards it, signed by the program's identity, to whatever registered
//! program and entry point the interaction named.
//!
//! Interaction `n` of a context always lives at the address derived from
//! `("interaction", context, n)`, so clients can compute it before the
//! interaction exists.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Instruction builders and account addresses
pub mod instruction;

/// Entry points
pub mod processor;

/// Records and protocol transitions
pub mod state;

pub use instruction::{
    context_address, counted_context_address, counter_address, id, identity_address,
    interaction_address, InteractArgs,
};
pub use processor::OracleProgram;
pub use state::{CallbackTarget, ContextAccount, Counter, Interaction};
