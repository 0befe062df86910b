//! Loyal Agent - a program that talks to the oracle
//!
//! The agent owns a counter-keyed oracle context, sends prompts through
//! `interact_with_llm` signed by its derived address, and receives answers
//! on its `callback` entry point. It shows how any registered program can
//! consume oracle output through the callback registry.

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Instruction builders
pub mod instruction;

/// Entry points
pub mod processor;

/// Agent record
pub mod state;

pub use instruction::{agent_address, id};
pub use processor::AgentProgram;
pub use state::Agent;
