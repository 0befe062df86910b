//! Client-side instruction builders and account addresses for the oracle

use loyal_core::{
    find_program_address, AccountMeta, Address, Discriminator, Instruction, InteractionStatus,
    Result,
};
use loyal_guards::IDENTITY_SEED;
use loyal_ledger::DelegateConfig;
use serde::{Deserialize, Serialize};

use crate::state::{
    CallbackTarget, Interaction, COUNTED_CONTEXT_SEED, CONTEXT_SEED, COUNTER_SEED,
    INTERACTION_SEED,
};

/// Program id of the oracle program
pub fn id() -> Address {
    Address::from_label("loyal-oracle")
}

/// Identity singleton and its bump
pub fn find_identity_address() -> Result<(Address, u8)> {
    find_program_address(&[IDENTITY_SEED], &id())
}

/// Identity singleton; signs every callback dispatch
pub fn identity_address() -> Result<Address> {
    find_identity_address().map(|(address, _)| address)
}

/// Counter singleton
pub fn counter_address() -> Result<Address> {
    find_program_address(&[COUNTER_SEED], &id()).map(|(address, _)| address)
}

/// Context keyed by its owner
pub fn context_address(owner: &Address) -> Result<Address> {
    find_program_address(&[CONTEXT_SEED, owner.as_ref()], &id())
        .map(|(address, _)| address)
}

/// Context minted from counter value `count`
pub fn counted_context_address(count: u32) -> Result<Address> {
    find_program_address(&[COUNTED_CONTEXT_SEED, &count.to_le_bytes()], &id())
        .map(|(address, _)| address)
}

/// Interaction `id` of `context`
pub fn interaction_address(context: &Address, id: u64) -> Result<Address> {
    let seeds: &[&[u8]] = &[INTERACTION_SEED, context.as_ref(), &id.to_le_bytes()];
    find_program_address(seeds, &crate::id()).map(|(address, _)| address)
}

/// Selector of the oracle's own callback entry point
pub fn callback_from_oracle_discriminator() -> Discriminator {
    Discriminator::for_instruction("callback_from_oracle")
}

/// Arguments of `create_context` and `create_counted_context`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateContextArgs {
    /// Optional description
    pub text: Option<String>,
}

/// Arguments of `interact_with_llm`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractArgs {
    /// Interaction id: the context's next id to create, an existing one to edit
    pub id: u64,
    /// Prompt; on edit, `None` keeps the current prompt
    pub text: Option<String>,
    /// Receiving program
    pub callback_program_id: Address,
    /// Receiving entry point
    pub callback_discriminator: Discriminator,
    /// Accounts the callback needs
    pub extra_accounts: Option<Vec<AccountMeta>>,
    /// Master key of the attached file; ignored on edit
    pub cmk: Address,
    /// Transaction that stored the attached file; ignored on edit
    pub tx_id: Address,
}

impl InteractArgs {
    /// Arguments delivering the response to `target`
    pub fn new(id: u64, text: Option<String>, target: CallbackTarget) -> Self {
        let extra_accounts = if target.extra_accounts.is_empty() {
            None
        } else {
            Some(target.extra_accounts)
        };
        Self {
            id,
            text,
            callback_program_id: target.program_id,
            callback_discriminator: target.discriminator,
            extra_accounts,
            cmk: Address::default(),
            tx_id: Address::default(),
        }
    }

    /// Attach the key material `get_dek` derives the file key from
    pub fn with_key_material(mut self, cmk: Address, tx_id: Address) -> Self {
        self.cmk = cmk;
        self.tx_id = tx_id;
        self
    }

    /// Callback target named by these arguments
    pub fn target(&self) -> CallbackTarget {
        CallbackTarget::new(self.callback_program_id, self.callback_discriminator)
            .with_accounts(self.extra_accounts.clone().unwrap_or_default())
    }
}

/// Arguments of `callback_from_llm`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackArgs {
    /// Response text so far
    pub response: String,
    /// Whether this is the final delivery
    pub is_processed: bool,
}

/// Arguments of `delegate_interaction`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateInteractionArgs {
    /// Interaction id within the context
    pub id: u64,
    /// Delegation options
    pub config: DelegateConfig,
}

/// Create the identity and counter singletons
pub fn initialize(payer: &Address) -> Result<Instruction> {
    Instruction::new(
        id(),
        "initialize",
        vec![
            AccountMeta::new(identity_address()?, false),
            AccountMeta::new(counter_address()?, false),
            AccountMeta::readonly(*payer, true),
        ],
        &(),
    )
}

/// Create the context keyed by `owner`
pub fn create_context(owner: &Address, text: Option<String>) -> Result<Instruction> {
    Instruction::new(
        id(),
        "create_context",
        vec![
            AccountMeta::new(context_address(owner)?, false),
            AccountMeta::readonly(*owner, true),
        ],
        &CreateContextArgs { text },
    )
}

/// Create the context minted from the counter's current value `count`
pub fn create_counted_context(
    owner: &Address,
    count: u32,
    text: Option<String>,
) -> Result<Instruction> {
    Instruction::new(
        id(),
        "create_counted_context",
        vec![
            AccountMeta::new(counter_address()?, false),
            AccountMeta::new(counted_context_address(count)?, false),
            AccountMeta::readonly(*owner, true),
        ],
        &CreateContextArgs { text },
    )
}

/// Create or edit interaction `args.id` of `context`; signed by the context owner
pub fn interact_with_llm(
    user: &Address,
    context: &Address,
    args: InteractArgs,
) -> Result<Instruction> {
    Instruction::new(
        id(),
        "interact_with_llm",
        vec![
            AccountMeta::new(*context, false),
            AccountMeta::new(interaction_address(context, args.id)?, false),
            AccountMeta::readonly(*user, true),
        ],
        &args,
    )
}

/// Deliver a response to `interaction` and dispatch its callback; signed by the oracle
pub fn callback_from_llm(
    oracle: &Address,
    address: &Address,
    interaction: &Interaction,
    response: impl Into<String>,
    is_processed: bool,
) -> Result<Instruction> {
    let mut accounts = vec![
        AccountMeta::readonly(*oracle, true),
        AccountMeta::readonly(identity_address()?, false),
        AccountMeta::new(*address, false),
        AccountMeta::readonly(interaction.callback_program_id, false),
    ];
    accounts.extend(interaction.extra_accounts.iter().map(|meta| AccountMeta {
        is_signer: false,
        ..*meta
    }));
    Instruction::new(
        id(),
        "callback_from_llm",
        accounts,
        &CallbackArgs {
            response: response.into(),
            is_processed,
        },
    )
}

/// Set the status of `interaction`; signed by its user or the oracle
pub fn update_status(
    caller: &Address,
    interaction: &Address,
    status: InteractionStatus,
) -> Result<Instruction> {
    Instruction::new(
        id(),
        "update_status",
        vec![
            AccountMeta::new(*interaction, false),
            AccountMeta::readonly(identity_address()?, false),
            AccountMeta::readonly(*caller, true),
        ],
        &status,
    )
}

/// Derive the file key of `interaction`; signed by its user or the oracle
pub fn get_dek(caller: &Address, interaction: &Address) -> Result<Instruction> {
    Instruction::new(
        id(),
        "get_dek",
        vec![
            AccountMeta::readonly(*interaction, false),
            AccountMeta::readonly(identity_address()?, false),
            AccountMeta::readonly(*caller, true),
        ],
        &(),
    )
}

/// Move `owner`'s context to a rollup
pub fn delegate_context(
    owner: &Address,
    context: &Address,
    config: DelegateConfig,
) -> Result<Instruction> {
    Instruction::new(
        id(),
        "delegate_context",
        vec![
            AccountMeta::new(*context, false),
            AccountMeta::readonly(*owner, true),
        ],
        &config,
    )
}

/// Move interaction `id` of `context` to a rollup
pub fn delegate_interaction(
    owner: &Address,
    context: &Address,
    id: u64,
    config: DelegateConfig,
) -> Result<Instruction> {
    Instruction::new(
        crate::id(),
        "delegate_interaction",
        vec![
            AccountMeta::readonly(*context, false),
            AccountMeta::new(interaction_address(context, id)?, false),
            AccountMeta::readonly(*owner, true),
        ],
        &DelegateInteractionArgs { id, config },
    )
}

fn rollup_call(entry: &str, caller: &Address, account: &Address) -> Result<Instruction> {
    Instruction::new(
        id(),
        entry,
        vec![
            AccountMeta::new(*account, false),
            AccountMeta::readonly(identity_address()?, false),
            AccountMeta::readonly(*caller, true),
        ],
        &(),
    )
}

/// Checkpoint a delegated context or interaction; signed by its owner or the oracle
pub fn commit(caller: &Address, account: &Address) -> Result<Instruction> {
    rollup_call("commit", caller, account)
}

/// Return a delegated context or interaction to base; signed by its owner or the oracle
pub fn undelegate(caller: &Address, account: &Address) -> Result<Instruction> {
    rollup_call("undelegate", caller, account)
}
