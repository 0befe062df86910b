//! Client-side instruction builders for the chat program

use loyal_core::{find_program_address, AccountMeta, Address, Instruction, Result};
use loyal_guards::IDENTITY_SEED;
use loyal_ledger::DelegateConfig;
use serde::{Deserialize, Serialize};

use crate::state::CHAT_SEED;

/// Program id of the chat program
pub fn id() -> Address {
    Address::from_label("loyal-inference")
}

/// Chat account of `owner`
pub fn chat_address(owner: &Address) -> Result<Address> {
    find_program_address(&[CHAT_SEED, owner.as_ref()], &id())
        .map(|(address, _)| address)
}

/// Identity singleton of the chat program
pub fn identity_address() -> Result<Address> {
    find_program_address(&[IDENTITY_SEED], &id()).map(|(address, _)| address)
}

/// Arguments of `message_in` and `message_out`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageArgs {
    /// Message body
    pub text: Vec<u8>,
}

/// Create the caller's chat, and the identity record on first use
pub fn initialize(owner: &Address) -> Result<Instruction> {
    Instruction::new(
        id(),
        "initialize",
        vec![
            AccountMeta::new(chat_address(owner)?, false),
            AccountMeta::new(identity_address()?, false),
            AccountMeta::readonly(*owner, true),
        ],
        &(),
    )
}

/// User message; signed by the chat owner
pub fn message_in(owner: &Address, text: impl Into<Vec<u8>>) -> Result<Instruction> {
    Instruction::new(
        id(),
        "message_in",
        vec![
            AccountMeta::new(chat_address(owner)?, false),
            AccountMeta::readonly(*owner, true),
        ],
        &MessageArgs { text: text.into() },
    )
}

/// Model response to `owner`'s chat; signed by the oracle
pub fn message_out(
    oracle: &Address,
    owner: &Address,
    text: impl Into<Vec<u8>>,
) -> Result<Instruction> {
    Instruction::new(
        id(),
        "message_out",
        vec![
            AccountMeta::new(chat_address(owner)?, false),
            AccountMeta::readonly(identity_address()?, false),
            AccountMeta::readonly(*oracle, true),
        ],
        &MessageArgs { text: text.into() },
    )
}

/// Move `owner`'s chat to a rollup; signed by the owner
pub fn delegate_chat(owner: &Address, config: DelegateConfig) -> Result<Instruction> {
    Instruction::new(
        id(),
        "delegate_chat",
        vec![
            AccountMeta::new(chat_address(owner)?, false),
            AccountMeta::readonly(*owner, true),
        ],
        &config,
    )
}

fn rollup_call(entry: &str, caller: &Address, owner: &Address) -> Result<Instruction> {
    Instruction::new(
        id(),
        entry,
        vec![
            AccountMeta::new(chat_address(owner)?, false),
            AccountMeta::readonly(identity_address()?, false),
            AccountMeta::readonly(*caller, true),
        ],
        &(),
    )
}

/// Checkpoint a delegated chat; signed by the owner or the oracle
pub fn commit_chat(caller: &Address, owner: &Address) -> Result<Instruction> {
    rollup_call("commit_chat", caller, owner)
}

/// Return a delegated chat to the base layer; signed by the owner or the oracle
pub fn undelegate_chat(caller: &Address, owner: &Address) -> Result<Instruction> {
    rollup_call("undelegate_chat", caller, owner)
}
