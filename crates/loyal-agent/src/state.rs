//! Agent record

use loyal_core::{AccountState, Address};
use serde::{Deserialize, Serialize};

/// Seed of the agent singleton
pub const AGENT_SEED: &[u8] = b"agent";

/// System prompt of the agent's context
pub const AGENT_PROMPT: &str = "You are a helpful assistant.";

/// The agent's state: its oracle context and the latest answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Oracle context owned by the agent
    pub context: Address,
    /// Most recent response delivered by the oracle
    pub last_response: Option<String>,
    /// Number of responses received
    pub responses: u64,
}

impl AccountState for Agent {
    const NAME: &'static str = "Agent";
}
