//! Chat program entry points

use loyal_core::{Address, Instruction, LoyalError, ProgramEvent, ProgramId, Result};
use loyal_guards::{Identity, Role};
use loyal_ledger::{DelegateConfig, EntryPoint, InvokeContext, Program};

use crate::instruction::{self, MessageArgs};
use crate::state::{self, Chat};

/// The chat program
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatProgram;

impl ChatProgram {
    fn initialize(ctx: &mut InvokeContext<'_>) -> Result<()> {
        let chat = ctx.account(0)?.address;
        let identity = ctx.account(1)?.address;
        let owner = ctx.account(2)?.address;
        ctx.require_signer(&owner)?;
        check_address(&chat, &instruction::chat_address(&owner)?)?;
        check_address(&identity, &instruction::identity_address()?)?;

        if !ctx.exists(&identity) {
            let signer = ctx.config().oracle_signer()?;
            ctx.init(&identity, &Identity::new(signer))?;
            tracing::info!(oracle_signer = %signer.short(), "chat identity initialized");
        }
        ctx.init(&chat, &Chat::new(owner))?;
        ctx.emit(ProgramEvent::ChatInitialized { chat, owner });
        Ok(())
    }

    fn message_in(ctx: &mut InvokeContext<'_>, args: MessageArgs) -> Result<()> {
        let address = ctx.account(0)?.address;
        let caller = ctx.account(1)?.address;
        ctx.require_signer(&caller)?;

        let chat: Chat = ctx.load(&address)?;
        if caller != chat.owner {
            return Err(LoyalError::unauthorized(format!(
                "{} does not own chat {}",
                caller.short(),
                address.short()
            )));
        }
        let next = state::message_in(&chat, args.text)?;
        ctx.store(&address, &next)?;
        tracing::debug!(chat = %address.short(), "user message recorded");
        ctx.emit(ProgramEvent::ChatMessageIn {
            chat: address,
            owner: chat.owner,
        });
        Ok(())
    }

    fn message_out(ctx: &mut InvokeContext<'_>, args: MessageArgs) -> Result<()> {
        let address = ctx.account(0)?.address;
        let caller = ctx.account(2)?.address;
        ctx.require_signer(&caller)?;

        let chat: Chat = ctx.load(&address)?;
        load_identity(ctx)?
            .guard()
            .authorize(&caller, Some(&chat.owner), Role::OracleSigner)?;
        let next = state::message_out(&chat, args.text)?;
        ctx.store(&address, &next)?;
        tracing::debug!(chat = %address.short(), "model response recorded");
        ctx.emit(ProgramEvent::ChatMessageOut {
            chat: address,
            owner: chat.owner,
        });
        Ok(())
    }

    fn delegate_chat(ctx: &mut InvokeContext<'_>, config: DelegateConfig) -> Result<()> {
        let address = ctx.account(0)?.address;
        let caller = ctx.account(1)?.address;
        ctx.require_signer(&caller)?;

        let chat: Chat = ctx.load(&address)?;
        if caller != chat.owner {
            return Err(LoyalError::unauthorized(format!(
                "only the owner may delegate chat {}",
                address.short()
            )));
        }
        ctx.delegate_account(&address, config)?;
        Ok(())
    }

    fn rollup_call(ctx: &mut InvokeContext<'_>, undelegate: bool) -> Result<()> {
        let address = ctx.account(0)?.address;
        let caller = ctx.account(2)?.address;
        ctx.require_signer(&caller)?;

        let chat: Chat = ctx.load(&address)?;
        load_identity(ctx)?
            .guard()
            .authorize(&caller, Some(&chat.owner), Role::Either)?;
        if undelegate {
            ctx.undelegate_account(&address)
        } else {
            ctx.commit_account(&address)
        }
    }
}

fn load_identity(ctx: &InvokeContext<'_>) -> Result<Identity> {
    let identity = ctx.account(1)?.address;
    check_address(&identity, &instruction::identity_address()?)?;
    ctx.load(&identity)
}

fn check_address(actual: &Address, expected: &Address) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(LoyalError::invalid_account_data(format!(
            "expected account {}, got {}",
            expected.short(),
            actual.short()
        )))
    }
}

impl Program for ChatProgram {
    fn id(&self) -> ProgramId {
        instruction::id()
    }

    fn name(&self) -> &'static str {
        "loyal-inference"
    }

    fn entry_points(&self) -> Vec<EntryPoint> {
        [
            "initialize",
            "message_in",
            "message_out",
            "delegate_chat",
            "commit_chat",
            "undelegate_chat",
        ]
        .into_iter()
        .map(EntryPoint::new)
        .collect()
    }

    fn process(
        &self,
        ctx: &mut InvokeContext<'_>,
        entry: &EntryPoint,
        instruction: &Instruction,
    ) -> Result<()> {
        match entry.name {
            "initialize" => Self::initialize(ctx),
            "message_in" => Self::message_in(ctx, instruction.args()?),
            "message_out" => Self::message_out(ctx, instruction.args()?),
            "delegate_chat" => Self::delegate_chat(ctx, instruction.args()?),
            "commit_chat" => Self::rollup_call(ctx, false),
            "undelegate_chat" => Self::rollup_call(ctx, true),
            other => Err(LoyalError::invalid_account_data(format!(
                "chat program has no handler for {other}"
            ))),
        }
    }
}
