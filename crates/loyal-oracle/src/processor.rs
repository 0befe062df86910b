//! Oracle program entry points

use loyal_core::{
    AccountMeta, Address, Instruction, InteractionStatus, LoyalError, ProgramEvent,
    ProgramId, Result,
};
use loyal_guards::{Identity, Role, IDENTITY_SEED};
use loyal_ledger::{DelegateConfig, EntryPoint, InvokeContext, Program};

use crate::instruction::{
    self, CallbackArgs, CreateContextArgs, DelegateInteractionArgs, InteractArgs,
};
use crate::state::{self, ContextAccount, Counter, Interaction};

/// The oracle program
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleProgram;

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

fn load_identity(ctx: &InvokeContext<'_>, index: usize) -> Result<Identity> {
    let identity = ctx.account(index)?.address;
    check_address(&identity, &instruction::identity_address()?)?;
    ctx.load(&identity)
}

fn require_owner(caller: &Address, owner: &Address, what: &str) -> Result<()> {
    if caller == owner {
        Ok(())
    } else {
        Err(LoyalError::unauthorized(format!(
            "{} does not own {what}",
            caller.short()
        )))
    }
}

/// Owner of a context or interaction account
fn owner_of_record(ctx: &InvokeContext<'_>, address: &Address) -> Result<Address> {
    if let Ok(context) = ctx.load::<ContextAccount>(address) {
        return Ok(context.owner);
    }
    ctx.load::<Interaction>(address).map(|interaction| interaction.user)
}

impl OracleProgram {
    fn initialize(ctx: &mut InvokeContext<'_>) -> Result<()> {
        let identity = ctx.account(0)?.address;
        let counter = ctx.account(1)?.address;
        let payer = ctx.account(2)?.address;
        ctx.require_signer(&payer)?;
        check_address(&identity, &instruction::identity_address()?)?;
        check_address(&counter, &instruction::counter_address()?)?;

        let signer = ctx.config().oracle_signer()?;
        ctx.init(&identity, &Identity::new(signer))?;
        ctx.init(&counter, &Counter::default())?;
        tracing::info!(oracle_signer = %signer.short(), "oracle initialized");
        Ok(())
    }

    fn create_context(ctx: &mut InvokeContext<'_>, args: CreateContextArgs) -> Result<()> {
        let context = ctx.account(0)?.address;
        let owner = ctx.account(1)?.address;
        ctx.require_signer(&owner)?;
        check_address(&context, &instruction::context_address(&owner)?)?;

        ctx.init(&context, &ContextAccount::new(owner, args.text, None))?;
        ctx.emit(ProgramEvent::ContextCreated {
            context,
            owner,
            sequence: None,
        });
        Ok(())
    }

    fn create_counted_context(ctx: &mut InvokeContext<'_>, args: CreateContextArgs) -> Result<()> {
        let counter_address = ctx.account(0)?.address;
        let context = ctx.account(1)?.address;
        let owner = ctx.account(2)?.address;
        ctx.require_signer(&owner)?;
        check_address(&counter_address, &instruction::counter_address()?)?;

        let counter: Counter = ctx.load(&counter_address)?;
        let sequence = counter.count;
        check_address(&context, &instruction::counted_context_address(sequence)?)?;

        ctx.init(&context, &ContextAccount::new(owner, args.text, Some(sequence)))?;
        let next = Counter {
            count: sequence
                .checked_add(1)
                .ok_or_else(|| LoyalError::invalid_account_data("context counter exhausted"))?,
        };
        ctx.store(&counter_address, &next)?;
        ctx.emit(ProgramEvent::ContextCreated {
            context,
            owner,
            sequence: Some(sequence),
        });
        Ok(())
    }

    fn interact_with_llm(ctx: &mut InvokeContext<'_>, args: InteractArgs) -> Result<()> {
        let context_address = ctx.account(0)?.address;
        let interaction_address = ctx.account(1)?.address;
        let user = ctx.account(2)?.address;
        ctx.require_signer(&user)?;

        let context: ContextAccount = ctx.load(&context_address)?;
        require_owner(&user, &context.owner, "this context")?;
        check_address(
            &interaction_address,
            &instruction::interaction_address(&context_address, args.id)?,
        )?;

        if let Some(existing) = ctx.try_load::<Interaction>(&interaction_address)? {
            let policy = ctx.config().oracle.edit_policy;
            let target = args.target();
            let edited =
                state::edit_interaction(&interaction_address, &existing, args.text, target, policy)?;
            ctx.store(&interaction_address, &edited)?;
            tracing::debug!(interaction = %interaction_address.short(), id = args.id, ?policy, "interaction edited");
            ctx.emit(ProgramEvent::InteractionEdited {
                context: context_address,
                interaction: interaction_address,
                id: args.id,
            });
            return Ok(());
        }

        state::check_next_id(&context, args.id)?;
        let target = args.target();
        let interaction = Interaction {
            context: context_address,
            user,
            id: args.id,
            text: args.text,
            is_processed: false,
            callback_program_id: target.program_id,
            callback_discriminator: target.discriminator,
            extra_accounts: target.extra_accounts,
            response: None,
            status: InteractionStatus::Pending,
            created_at_ms: ctx.now_ms(),
            cmk: args.cmk,
            tx_id: args.tx_id,
        };
        ctx.init(&interaction_address, &interaction)?;
        ctx.store(&context_address, &state::advance_context(&context)?)?;
        tracing::debug!(interaction = %interaction_address.short(), id = args.id, "interaction created");
        ctx.emit(ProgramEvent::InteractionRequested {
            context: context_address,
            interaction: interaction_address,
            id: args.id,
        });
        Ok(())
    }

    fn callback_from_llm(ctx: &mut InvokeContext<'_>, args: CallbackArgs) -> Result<()> {
        let oracle = ctx.account(0)?.address;
        let identity_address = ctx.account(1)?.address;
        let interaction_address = ctx.account(2)?.address;
        let program = ctx.account(3)?.address;
        ctx.require_signer(&oracle)?;
        load_identity(ctx, 1)?
            .guard()
            .authorize(&oracle, None, Role::OracleSigner)?;

        let interaction: Interaction = ctx.load(&interaction_address)?;
        if program != interaction.callback_program_id {
            return Err(LoyalError::WrongCallbackProgram {
                expected: interaction.callback_program_id,
                actual: program,
            });
        }
        if interaction
            .extra_accounts
            .iter()
            .any(|meta| meta.address == oracle)
        {
            return Err(LoyalError::invalid_account_data(
                "oracle signer may not be forwarded to a callback",
            ));
        }

        let max_len = ctx.config().oracle.max_response_len;
        let updated = state::deliver_response(
            &interaction_address,
            &interaction,
            args.response.clone(),
            args.is_processed,
            max_len,
        )?;
        ctx.store(&interaction_address, &updated)?;

        // identity signs, the interaction lets the receiver check which context answered
        let mut accounts = vec![
            AccountMeta::readonly(identity_address, true),
            AccountMeta::readonly(interaction_address, false),
        ];
        accounts.extend(interaction.extra_accounts.iter().map(|meta| AccountMeta {
            is_signer: false,
            ..*meta
        }));
        let callback = Instruction::with_discriminator(
            interaction.callback_program_id,
            interaction.callback_discriminator,
            accounts,
            bincode::serialize(&args.response)?,
        );
        let (_, bump) = instruction::find_identity_address()?;
        let seeds: &[&[u8]] = &[IDENTITY_SEED, &[bump]];
        ctx.invoke_signed(&callback, &[seeds])?;

        tracing::debug!(
            interaction = %interaction_address.short(),
            is_processed = args.is_processed,
            "callback delivered"
        );
        ctx.emit(ProgramEvent::CallbackDelivered {
            interaction: interaction_address,
            callback_program: interaction.callback_program_id,
            is_processed: args.is_processed,
        });
        Ok(())
    }

    fn callback_from_oracle(ctx: &mut InvokeContext<'_>, response: String) -> Result<()> {
        let identity = ctx.account(0)?.address;
        check_address(&identity, &instruction::identity_address()?)?;
        if !ctx.is_signer(&identity) {
            return Err(LoyalError::unauthorized(
                "callback must be signed by the oracle identity",
            ));
        }
        tracing::info!(len = response.len(), "oracle callback received");
        ctx.emit(ProgramEvent::OracleCallbackReceived { response });
        Ok(())
    }

    fn update_status(ctx: &mut InvokeContext<'_>, status: InteractionStatus) -> Result<()> {
        let address = ctx.account(0)?.address;
        let caller = ctx.account(2)?.address;
        ctx.require_signer(&caller)?;

        let interaction: Interaction = ctx.load(&address)?;
        load_identity(ctx, 1)?
            .guard()
            .authorize(&caller, Some(&interaction.user), Role::Either)?;
        ctx.store(
            &address,
            &Interaction {
                status,
                ..interaction
            },
        )?;
        ctx.emit(ProgramEvent::StatusUpdated {
            interaction: address,
            status,
        });
        Ok(())
    }

    fn get_dek(ctx: &mut InvokeContext<'_>) -> Result<()> {
        let address = ctx.account(0)?.address;
        let caller = ctx.account(2)?.address;
        ctx.require_signer(&caller)?;

        let interaction: Interaction = ctx.load(&address)?;
        load_identity(ctx, 1)?
            .guard()
            .authorize(&caller, Some(&interaction.user), Role::Either)?;
        let dek = state::derive_dek(&interaction.cmk, &interaction.tx_id)?;
        tracing::debug!(interaction = %address.short(), requester = %caller.short(), "dek derived");
        ctx.emit(ProgramEvent::DekResponse {
            interaction: address,
            id: interaction.id,
            dek,
        });
        Ok(())
    }

    fn delegate_context(ctx: &mut InvokeContext<'_>, config: DelegateConfig) -> Result<()> {
        let address = ctx.account(0)?.address;
        let caller = ctx.account(1)?.address;
        ctx.require_signer(&caller)?;

        let context: ContextAccount = ctx.load(&address)?;
        require_owner(&caller, &context.owner, "this context")?;
        ctx.delegate_account(&address, config)?;
        Ok(())
    }

    fn delegate_interaction(
        ctx: &mut InvokeContext<'_>,
        args: DelegateInteractionArgs,
    ) -> Result<()> {
        let context_address = ctx.account(0)?.address;
        let address = ctx.account(1)?.address;
        let caller = ctx.account(2)?.address;
        ctx.require_signer(&caller)?;
        check_address(
            &address,
            &instruction::interaction_address(&context_address, args.id)?,
        )?;

        let context: ContextAccount = ctx.load(&context_address)?;
        require_owner(&caller, &context.owner, "this context")?;
        // existence and type check
        ctx.load::<Interaction>(&address)?;
        ctx.delegate_account(&address, args.config)?;
        Ok(())
    }

    fn rollup_call(ctx: &mut InvokeContext<'_>, undelegate: bool) -> Result<()> {
        let address = ctx.account(0)?.address;
        let caller = ctx.account(2)?.address;
        ctx.require_signer(&caller)?;

        let owner = owner_of_record(ctx, &address)?;
        load_identity(ctx, 1)?
            .guard()
            .authorize(&caller, Some(&owner), Role::Either)?;
        if undelegate {
            ctx.undelegate_account(&address)
        } else {
            ctx.commit_account(&address)
        }
    }
}

impl Program for OracleProgram {
    fn id(&self) -> ProgramId {
        instruction::id()
    }

    fn name(&self) -> &'static str {
        "loyal-oracle"
    }

    fn entry_points(&self) -> Vec<EntryPoint> {
        [
            "initialize",
            "create_context",
            "create_counted_context",
            "interact_with_llm",
            "callback_from_llm",
            "callback_from_oracle",
            "update_status",
            "get_dek",
            "delegate_context",
            "delegate_interaction",
            "commit",
            "undelegate",
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
            "create_context" => Self::create_context(ctx, instruction.args()?),
            "create_counted_context" => Self::create_counted_context(ctx, instruction.args()?),
            "interact_with_llm" => Self::interact_with_llm(ctx, instruction.args()?),
            "callback_from_llm" => Self::callback_from_llm(ctx, instruction.args()?),
            "callback_from_oracle" => Self::callback_from_oracle(ctx, instruction.args()?),
            "update_status" => Self::update_status(ctx, instruction.args()?),
            "get_dek" => Self::get_dek(ctx),
            "delegate_context" => Self::delegate_context(ctx, instruction.args()?),
            "delegate_interaction" => Self::delegate_interaction(ctx, instruction.args()?),
            "commit" => Self::rollup_call(ctx, false),
            "undelegate" => Self::rollup_call(ctx, true),
            other => Err(LoyalError::invalid_account_data(format!(
                "oracle program has no handler for {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::CallbackTarget;
    use assert_matches::assert_matches;
    use loyal_core::{Keypair, LoyalConfig};
    use loyal_ledger::{Ledger, ProgramRegistry, Venue};
    use std::sync::Arc;

    struct Fixture {
        ledger: Ledger,
        user: Keypair,
        oracle: Keypair,
        context: Address,
    }

    fn self_target() -> CallbackTarget {
        CallbackTarget::new(
            instruction::id(),
            instruction::callback_from_oracle_discriminator(),
        )
    }

    fn fixture() -> Fixture {
        let oracle = Keypair::from_seed(&[0xAA; 32]);
        let user = Keypair::from_seed(&[0x01; 32]);
        let mut registry = ProgramRegistry::new();
        registry.register(Arc::new(OracleProgram)).unwrap();
        let config = LoyalConfig::default().with_oracle_signer(oracle.address());
        let ledger = Ledger::new(config, registry).unwrap();
        let context = instruction::context_address(&user.address()).unwrap();
        ledger
            .send(
                Venue::Base,
                vec![
                    instruction::initialize(&user.address()).unwrap(),
                    instruction::create_context(&user.address(), None).unwrap(),
                ],
                &[&user],
            )
            .unwrap();
        Fixture {
            ledger,
            user,
            oracle,
            context,
        }
    }

    fn interact(f: &Fixture, id: u64, text: &str) -> Result<loyal_ledger::TransactionReceipt> {
        f.ledger.send(
            Venue::Base,
            vec![instruction::interact_with_llm(
                &f.user.address(),
                &f.context,
                InteractArgs::new(id, Some(text.to_string()), self_target()),
            )?],
            &[&f.user],
        )
    }

    fn interaction(f: &Fixture, id: u64) -> (Address, Interaction) {
        let address = instruction::interaction_address(&f.context, id).unwrap();
        (address, f.ledger.fetch(Venue::Base, &address).unwrap())
    }

    fn callback(f: &Fixture, id: u64, response: &str, done: bool) -> Result<loyal_ledger::TransactionReceipt> {
        let (address, record) = interaction(f, id);
        f.ledger.send(
            Venue::Base,
            vec![instruction::callback_from_llm(
                &f.oracle.address(),
                &address,
                &record,
                response,
                done,
            )?],
            &[&f.oracle],
        )
    }

    #[test]
    fn test_initialize_twice_rejected() {
        let f = fixture();
        assert_matches!(
            f.ledger.send(
                Venue::Base,
                vec![instruction::initialize(&f.user.address()).unwrap()],
                &[&f.user]
            ),
            Err(LoyalError::AlreadyInitialized { .. })
        );
    }

    #[test]
    fn test_skipped_id_rejected() {
        let f = fixture();
        assert_matches!(
            interact(&f, 1, "too early"),
            Err(LoyalError::SequenceMismatch {
                expected: 0,
                actual: 1
            })
        );
    }

    #[test]
    fn test_callback_round_trip() {
        let f = fixture();
        interact(&f, 0, "Can you give me some token?").unwrap();
        let receipt = callback(&f, 0, "Here is your token", true).unwrap();

        let kinds: Vec<_> = receipt.events.iter().map(|e| e.event.kind()).collect();
        assert_eq!(kinds, vec!["oracle_callback_received", "callback_delivered"]);
        let (_, record) = interaction(&f, 0);
        assert!(record.is_processed);
        assert_eq!(record.response.as_deref(), Some("Here is your token"));

        assert_matches!(
            callback(&f, 0, "again", true),
            Err(LoyalError::AlreadyProcessed { .. })
        );
        assert_eq!(
            interaction(&f, 0).1.response.as_deref(),
            Some("Here is your token")
        );
    }

    #[test]
    fn test_callback_requires_oracle() {
        let f = fixture();
        interact(&f, 0, "q").unwrap();
        let (address, record) = interaction(&f, 0);
        let forged = instruction::callback_from_llm(&f.user.address(), &address, &record, "x", true)
            .unwrap();
        assert_matches!(
            f.ledger.send(Venue::Base, vec![forged], &[&f.user]),
            Err(LoyalError::Unauthorized { .. })
        );
    }

    #[test]
    fn test_callback_to_wrong_program() {
        let f = fixture();
        interact(&f, 0, "q").unwrap();
        let (address, mut record) = interaction(&f, 0);
        record.callback_program_id = Address::from_label("someone-else");
        let ix = instruction::callback_from_llm(&f.oracle.address(), &address, &record, "x", true)
            .unwrap();
        assert_matches!(
            f.ledger.send(Venue::Base, vec![ix], &[&f.oracle]),
            Err(LoyalError::WrongCallbackProgram { .. })
        );
    }

    #[test]
    fn test_unregistered_callback_target() {
        let f = fixture();
        let target = CallbackTarget::new(
            instruction::id(),
            loyal_core::Discriminator::for_instruction("no_such_entry"),
        );
        f.ledger
            .send(
                Venue::Base,
                vec![instruction::interact_with_llm(
                    &f.user.address(),
                    &f.context,
                    InteractArgs::new(0, Some("q".into()), target),
                )
                .unwrap()],
                &[&f.user],
            )
            .unwrap();
        assert_matches!(
            callback(&f, 0, "r", true),
            Err(LoyalError::UnknownTarget { .. })
        );
        assert!(!interaction(&f, 0).1.is_processed);
    }

    #[test]
    fn test_edit_before_callback() {
        let f = fixture();
        interact(&f, 0, "first").unwrap();
        callback(&f, 0, "par", false).unwrap();
        let receipt = interact(&f, 0, "second").unwrap();
        assert_eq!(receipt.events[0].event.kind(), "interaction_edited");

        let (_, record) = interaction(&f, 0);
        assert_eq!(record.text.as_deref(), Some("second"));
        assert_eq!(record.response, None);
        let context: ContextAccount = f.ledger.fetch(Venue::Base, &f.context).unwrap();
        assert_eq!(context.next_interaction, 1);
    }

    #[test]
    fn test_only_owner_interacts() {
        let f = fixture();
        let stranger = Keypair::from_seed(&[0x05; 32]);
        let ix = instruction::interact_with_llm(
            &stranger.address(),
            &f.context,
            InteractArgs::new(0, None, self_target()),
        )
        .unwrap();
        assert_matches!(
            f.ledger.send(Venue::Base, vec![ix], &[&stranger]),
            Err(LoyalError::Unauthorized { .. })
        );
    }

    #[test]
    fn test_counted_contexts_never_reuse_sequence() {
        let f = fixture();
        for count in 0..3u32 {
            let receipt = f
                .ledger
                .send(
                    Venue::Base,
                    vec![instruction::create_counted_context(&f.user.address(), count, None).unwrap()],
                    &[&f.user],
                )
                .unwrap();
            assert_matches!(
                receipt.events[0].event,
                ProgramEvent::ContextCreated { sequence: Some(s), .. } if s == count
            );
        }
        let counter: Counter = f
            .ledger
            .fetch(Venue::Base, &instruction::counter_address().unwrap())
            .unwrap();
        assert_eq!(counter.count, 3);
        assert!(f
            .ledger
            .send(
                Venue::Base,
                vec![instruction::create_counted_context(&f.user.address(), 1, None).unwrap()],
                &[&f.user],
            )
            .is_err());
    }

    #[test]
    fn test_status_update() {
        let f = fixture();
        interact(&f, 0, "q").unwrap();
        let (address, _) = interaction(&f, 0);
        f.ledger
            .send(
                Venue::Base,
                vec![instruction::update_status(&f.oracle.address(), &address, InteractionStatus::Error).unwrap()],
                &[&f.oracle],
            )
            .unwrap();
        assert_eq!(interaction(&f, 0).1.status, InteractionStatus::Error);
    }

    #[test]
    fn test_dek_derived_from_interaction_key_material() {
        let f = fixture();
        let args = InteractArgs::new(0, Some("summarise the file".into()), self_target())
            .with_key_material(Address([0x11; 32]), Address([0x22; 32]));
        f.ledger
            .send(
                Venue::Base,
                vec![instruction::interact_with_llm(&f.user.address(), &f.context, args).unwrap()],
                &[&f.user],
            )
            .unwrap();
        let (address, record) = interaction(&f, 0);
        assert_eq!(record.cmk, Address([0x11; 32]));

        let expected = state::derive_dek(&record.cmk, &record.tx_id).unwrap();
        for caller in [&f.user, &f.oracle] {
            let receipt = f
                .ledger
                .send(
                    Venue::Base,
                    vec![instruction::get_dek(&caller.address(), &address).unwrap()],
                    &[caller],
                )
                .unwrap();
            assert_matches!(
                receipt.events[0].event,
                ProgramEvent::DekResponse { interaction: at, id: 0, dek }
                    if at == address && dek == expected
            );
        }

        let stranger = Keypair::from_seed(&[0x06; 32]);
        assert_matches!(
            f.ledger.send(
                Venue::Base,
                vec![instruction::get_dek(&stranger.address(), &address).unwrap()],
                &[&stranger],
            ),
            Err(LoyalError::Unauthorized { .. })
        );
    }
}
