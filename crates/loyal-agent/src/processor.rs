//! Agent program entry points

use loyal_core::{AccountMeta, Instruction, LoyalError, ProgramEvent, ProgramId, Result};
use loyal_ledger::{EntryPoint, InvokeContext, Program};
use loyal_oracle::{CallbackTarget, ContextAccount, Counter, InteractArgs, Interaction};

use crate::instruction::{self, QueryArgs};
use crate::state::{Agent, AGENT_PROMPT, AGENT_SEED};

/// The agent program
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentProgram;

impl AgentProgram {
    fn initialize(ctx: &mut InvokeContext<'_>) -> Result<()> {
        let agent = ctx.account(0)?.address;
        let counter = ctx.account(1)?.address;
        let context = ctx.account(2)?.address;
        let payer = ctx.account(3)?.address;
        ctx.require_signer(&payer)?;

        let (expected, bump) = instruction::find_agent_address()?;
        if agent != expected {
            return Err(LoyalError::invalid_account_data("not the agent account"));
        }
        let count = ctx
            .load_owned_by::<Counter>(&counter, &loyal_oracle::id())?
            .count;

        ctx.init(
            &agent,
            &Agent {
                context,
                last_response: None,
                responses: 0,
            },
        )?;

        let create = loyal_oracle::instruction::create_counted_context(
            &agent,
            count,
            Some(AGENT_PROMPT.to_string()),
        )?;
        let seeds: &[&[u8]] = &[AGENT_SEED, &[bump]];
        ctx.invoke_signed(&create, &[seeds])?;
        tracing::info!(agent = %agent.short(), context = %context.short(), "agent initialized");
        Ok(())
    }

    fn query(ctx: &mut InvokeContext<'_>, args: QueryArgs) -> Result<()> {
        let agent_address = ctx.account(0)?.address;
        let context_address = ctx.account(1)?.address;
        let payer = ctx.account(3)?.address;
        ctx.require_signer(&payer)?;

        let agent: Agent = ctx.load(&agent_address)?;
        if context_address != agent.context {
            return Err(LoyalError::invalid_account_data("not the agent's context"));
        }
        let context: ContextAccount =
            ctx.load_owned_by(&context_address, &loyal_oracle::id())?;

        let target = CallbackTarget::new(instruction::id(), instruction::callback_discriminator())
            .with_accounts(vec![AccountMeta::new(agent_address, false)]);
        let interact = loyal_oracle::instruction::interact_with_llm(
            &agent_address,
            &context_address,
            InteractArgs::new(context.next_interaction, Some(args.text), target),
        )?;
        let (_, bump) = instruction::find_agent_address()?;
        let seeds: &[&[u8]] = &[AGENT_SEED, &[bump]];
        ctx.invoke_signed(&interact, &[seeds])?;
        tracing::debug!(id = context.next_interaction, "agent query sent");
        Ok(())
    }

    fn callback(ctx: &mut InvokeContext<'_>, response: String) -> Result<()> {
        let identity = ctx.account(0)?.address;
        let interaction_address = ctx.account(1)?.address;
        let agent_address = ctx.account(2)?.address;
        if identity != loyal_oracle::identity_address()? || !ctx.is_signer(&identity) {
            return Err(LoyalError::unauthorized(
                "agent callbacks must be signed by the oracle identity",
            ));
        }

        let mut agent: Agent = ctx.load(&agent_address)?;
        // the identity signs for every context; only the agent's own may answer
        let interaction: Interaction =
            ctx.load_owned_by(&interaction_address, &loyal_oracle::id())?;
        if interaction.context != agent.context {
            return Err(LoyalError::unauthorized(format!(
                "interaction {} does not belong to the agent's context",
                interaction_address.short()
            )));
        }

        agent.responses += 1;
        agent.last_response = Some(response.clone());
        ctx.store(&agent_address, &agent)?;
        tracing::info!(responses = agent.responses, "agent received response");
        ctx.emit(ProgramEvent::AgentResponse {
            agent: agent_address,
            response,
            responses: agent.responses,
        });
        Ok(())
    }
}

impl Program for AgentProgram {
    fn id(&self) -> ProgramId {
        instruction::id()
    }

    fn name(&self) -> &'static str {
        "loyal-agent"
    }

    fn entry_points(&self) -> Vec<EntryPoint> {
        ["initialize", "query", "callback"]
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
            "query" => Self::query(ctx, instruction.args()?),
            "callback" => Self::callback(ctx, instruction.args()?),
            other => Err(LoyalError::invalid_account_data(format!(
                "agent program has no handler for {other}"
            ))),
        }
    }
}
