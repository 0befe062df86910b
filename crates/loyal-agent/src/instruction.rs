//! Client-side instruction builders for the agent program

use loyal_core::{find_program_address, AccountMeta, Address, Discriminator, Instruction, Result};
use serde::{Deserialize, Serialize};

use crate::state::AGENT_SEED;

/// Program id of the agent program
pub fn id() -> Address {
    Address::from_label("loyal-agent")
}

/// Agent singleton and its bump
pub fn find_agent_address() -> Result<(Address, u8)> {
    find_program_address(&[AGENT_SEED], &id())
}

/// Agent singleton
pub fn agent_address() -> Result<Address> {
    find_agent_address().map(|(address, _)| address)
}

/// Selector of the entry point receiving oracle responses
pub fn callback_discriminator() -> Discriminator {
    Discriminator::for_instruction("callback")
}

/// Arguments of `query`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryArgs {
    /// Prompt for the model
    pub text: String,
}

/// Create the agent and its oracle context; `count` is the oracle counter's
/// current value
pub fn initialize(payer: &Address, count: u32) -> Result<Instruction> {
    Instruction::new(
        id(),
        "initialize",
        vec![
            AccountMeta::new(agent_address()?, false),
            AccountMeta::new(loyal_oracle::counter_address()?, false),
            AccountMeta::new(loyal_oracle::counted_context_address(count)?, false),
            AccountMeta::readonly(*payer, true),
        ],
        &(),
    )
}

/// Ask the model; `next_id` is the agent context's next interaction id
pub fn query(
    payer: &Address,
    context: &Address,
    next_id: u64,
    text: impl Into<String>,
) -> Result<Instruction> {
    Instruction::new(
        id(),
        "query",
        vec![
            AccountMeta::new(agent_address()?, false),
            AccountMeta::new(*context, false),
            AccountMeta::new(loyal_oracle::interaction_address(context, next_id)?, false),
            AccountMeta::readonly(*payer, true),
        ],
        &QueryArgs { text: text.into() },
    )
}
