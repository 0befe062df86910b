//! Oracle program: contexts, interactions, callbacks, edits

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use loyal_core::{
    AccountMeta, Address, Discriminator, EditPolicy, InteractionStatus, LoyalError, ProgramEvent,
};
use loyal_ledger::{DelegateConfig, Venue};
use loyal_oracle::{CallbackTarget, InteractArgs};
use loyal_testkit::{
    assert_delegated_to, assert_event_kinds, cluster_with_users, init_test_tracing,
    TestCluster, TestClusterBuilder,
};

fn target() -> CallbackTarget {
    TestCluster::oracle_callback_target()
}

#[test]
fn test_interaction_round_trip() {
    let (cluster, users) = cluster_with_users(1);
    let user = &users[0];
    cluster.init_oracle(user).unwrap();
    let context = cluster.create_context(user, None).unwrap();
    assert_eq!(cluster.context(&context, Venue::Base).unwrap().next_interaction, 0);

    let receipt = cluster
        .interact(Venue::Base, user, &context, 0, Some("Can you give me some token?"), target())
        .unwrap();
    assert_event_kinds!(receipt.events, ["interaction_requested"]);
    let interaction = cluster.interaction(&context, 0, Venue::Base).unwrap();
    assert_eq!(interaction.text.as_deref(), Some("Can you give me some token?"));
    assert!(!interaction.is_processed);
    assert_eq!(interaction.user, user.address());

    let receipt = cluster
        .callback(&context, 0, "Here is your token", true)
        .unwrap();
    assert_event_kinds!(receipt.events, ["oracle_callback_received", "callback_delivered"]);
    let interaction = cluster.interaction(&context, 0, Venue::Base).unwrap();
    assert_eq!(interaction.response.as_deref(), Some("Here is your token"));
    assert!(interaction.is_processed);
    assert_eq!(interaction.status, InteractionStatus::Done);

    assert_matches!(
        cluster.callback(&context, 0, "second", true),
        Err(LoyalError::AlreadyProcessed { .. })
    );
    assert_eq!(
        cluster
            .interaction(&context, 0, Venue::Base)
            .unwrap()
            .response
            .as_deref(),
        Some("Here is your token")
    );
}

#[test]
fn test_context_text_is_stored_verbatim() {
    let (cluster, users) = cluster_with_users(1);
    cluster.init_oracle(&users[0]).unwrap();
    let context = cluster
        .create_context(&users[0], Some("Summarise in  two   lines.\n"))
        .unwrap();
    let record = cluster.context(&context, Venue::Base).unwrap();
    assert_eq!(record.text.as_deref(), Some("Summarise in  two   lines.\n"));
    assert_eq!(record.owner, users[0].address());

    assert_matches!(
        cluster.create_context(&users[0], None),
        Err(LoyalError::AlreadyInitialized { .. })
    );
}

#[test]
fn test_sequential_ids() {
    let (cluster, users) = cluster_with_users(1);
    let user = &users[0];
    cluster.init_oracle(user).unwrap();
    let context = cluster.create_context(user, None).unwrap();

    for id in 0..5u64 {
        assert_eq!(cluster.context(&context, Venue::Base).unwrap().next_interaction, id);
        cluster
            .interact(Venue::Base, user, &context, id, Some("q"), target())
            .unwrap();
        let record = cluster.interaction(&context, id, Venue::Base).unwrap();
        assert_eq!(record.id, id);
    }
    assert_eq!(cluster.context(&context, Venue::Base).unwrap().next_interaction, 5);

    assert_matches!(
        cluster.interact(Venue::Base, user, &context, 7, Some("skip"), target()),
        Err(LoyalError::SequenceMismatch { expected: 5, actual: 7 })
    );
}

#[test]
fn test_replace_target_edit_policy() {
    init_test_tracing();
    let cluster = TestClusterBuilder::new()
        .with_edit_policy(EditPolicy::ReplaceTarget)
        .build()
        .unwrap();
    let user = loyal_testkit::KeyTestFixture::from_seed_string("editor");
    cluster.init_oracle(&user).unwrap();
    let context = cluster.create_context(&user, None).unwrap();
    cluster
        .interact(Venue::Base, &user, &context, 0, Some("first"), target())
        .unwrap();
    cluster.callback(&context, 0, "partial", false).unwrap();

    let agent_target = CallbackTarget::new(
        loyal_agent::id(),
        Discriminator::for_instruction("callback"),
    )
    .with_accounts(vec![AccountMeta::new(loyal_agent::agent_address().unwrap(), false)]);
    let receipt = cluster
        .interact(Venue::Base, &user, &context, 0, None, agent_target)
        .unwrap();
    assert_event_kinds!(receipt.events, ["interaction_edited"]);

    let record = cluster.interaction(&context, 0, Venue::Base).unwrap();
    assert_eq!(record.text.as_deref(), Some("first"));
    assert_eq!(record.callback_program_id, loyal_agent::id());
    assert_eq!(record.response, None);
    assert_eq!(record.status, InteractionStatus::Pending);
    assert_eq!(cluster.context(&context, Venue::Base).unwrap().next_interaction, 1);
}

#[test]
fn test_text_only_edit_policy() {
    let cluster = TestClusterBuilder::new()
        .with_edit_policy(EditPolicy::TextOnly)
        .build()
        .unwrap();
    let user = loyal_testkit::KeyTestFixture::from_seed_string("editor");
    cluster.init_oracle(&user).unwrap();
    let context = cluster.create_context(&user, None).unwrap();
    cluster
        .interact(Venue::Base, &user, &context, 0, Some("first"), target())
        .unwrap();
    cluster.callback(&context, 0, "partial", false).unwrap();

    let elsewhere = CallbackTarget::new(loyal_agent::id(), Discriminator::for_instruction("callback"));
    cluster
        .interact(Venue::Base, &user, &context, 0, Some("second"), elsewhere)
        .unwrap();

    let record = cluster.interaction(&context, 0, Venue::Base).unwrap();
    assert_eq!(record.text.as_deref(), Some("second"));
    assert_eq!(record.callback_program_id, loyal_oracle::id());
    assert_eq!(record.response.as_deref(), Some("partial"));

    cluster.callback(&context, 0, "done", true).unwrap();
    assert_matches!(
        cluster.interact(Venue::Base, &user, &context, 0, Some("late"), target()),
        Err(LoyalError::AlreadyProcessed { .. })
    );
}

#[test]
fn test_oversized_response_rejected() {
    let cluster = TestClusterBuilder::new()
        .with_max_response_len(8)
        .build()
        .unwrap();
    let user = loyal_testkit::KeyTestFixture::from_seed_string("verbose");
    cluster.init_oracle(&user).unwrap();
    let context = cluster.create_context(&user, None).unwrap();
    cluster
        .interact(Venue::Base, &user, &context, 0, Some("q"), target())
        .unwrap();
    assert_matches!(
        cluster.callback(&context, 0, "far too long", true),
        Err(LoyalError::ResponseTooLong { len: 12, max: 8 })
    );
}

#[test]
fn test_callback_on_rollup() {
    let (cluster, users) = cluster_with_users(1);
    let user = &users[0];
    cluster.init_oracle(user).unwrap();
    let context = cluster.create_context(user, None).unwrap();
    cluster
        .interact(Venue::Base, user, &context, 0, Some("q"), target())
        .unwrap();

    let ix = loyal_oracle::instruction::delegate_interaction(
        &user.address(),
        &context,
        0,
        DelegateConfig::default(),
    )
    .unwrap();
    cluster.send(Venue::Base, vec![ix], user).unwrap();
    let interaction = loyal_oracle::interaction_address(&context, 0).unwrap();
    let rollup = cluster.rollup();
    assert_delegated_to(&cluster.ledger, &interaction, rollup);

    cluster.callback(&context, 0, "fast answer", true).unwrap();
    assert!(cluster.interaction(&context, 0, rollup).unwrap().is_processed);
    assert!(!cluster.interaction(&context, 0, Venue::Base).unwrap().is_processed);

    let ix = loyal_oracle::instruction::undelegate(&cluster.oracle.address(), &interaction).unwrap();
    cluster.send(rollup, vec![ix], &cluster.oracle).unwrap();
    let settled = cluster.interaction(&context, 0, Venue::Base).unwrap();
    assert_eq!(settled.response.as_deref(), Some("fast answer"));
}

#[test]
fn test_edit_on_rollup_after_delegating_context() {
    let (cluster, users) = cluster_with_users(1);
    let user = &users[0];
    cluster.init_oracle(user).unwrap();
    let context = cluster.create_context(user, None).unwrap();
    cluster
        .interact(Venue::Base, user, &context, 0, Some("draft"), target())
        .unwrap();

    cluster
        .send(
            Venue::Base,
            vec![
                loyal_oracle::instruction::delegate_context(&user.address(), &context, DelegateConfig::default()).unwrap(),
                loyal_oracle::instruction::delegate_interaction(&user.address(), &context, 0, DelegateConfig::default()).unwrap(),
            ],
            user,
        )
        .unwrap();
    let rollup = cluster.rollup();
    cluster
        .interact(rollup, user, &context, 0, Some("final"), target())
        .unwrap();

    // creating new interactions needs the base layer
    assert_matches!(
        cluster.interact(rollup, user, &context, 1, Some("new"), target()),
        Err(LoyalError::InvalidDelegationState { .. })
    );

    let ix = loyal_oracle::instruction::commit(&user.address(), &loyal_oracle::interaction_address(&context, 0).unwrap()).unwrap();
    let receipt = cluster.send(rollup, vec![ix], user).unwrap();
    assert_event_kinds!(receipt.events, ["committed"]);
    assert_eq!(
        cluster.interaction(&context, 0, Venue::Base).unwrap().text.as_deref(),
        Some("final")
    );
}

#[test]
fn test_only_owner_delegates_context() {
    let (cluster, users) = cluster_with_users(2);
    cluster.init_oracle(&users[0]).unwrap();
    let context = cluster.create_context(&users[0], None).unwrap();
    let ix = loyal_oracle::instruction::delegate_context(&users[1].address(), &context, DelegateConfig::default()).unwrap();
    assert_matches!(
        cluster.send(Venue::Base, vec![ix], &users[1]),
        Err(LoyalError::Unauthorized { .. })
    );
}

#[test]
fn test_dek_request_reaches_subscribers() {
    let (cluster, users) = cluster_with_users(1);
    let user = &users[0];
    cluster.init_oracle(user).unwrap();
    let context = cluster.create_context(user, None).unwrap();
    let (cmk, tx_id) = (Address([0x11; 32]), Address([0x22; 32]));
    let args = InteractArgs::new(0, Some("what is in the file?".into()), target())
        .with_key_material(cmk, tx_id);
    let ix = loyal_oracle::instruction::interact_with_llm(&user.address(), &context, args).unwrap();
    cluster.send(Venue::Base, vec![ix], user).unwrap();
    let interaction = loyal_oracle::interaction_address(&context, 0).unwrap();
    let mut subscription = cluster.ledger.subscribe();

    let ix = loyal_oracle::instruction::get_dek(&cluster.oracle.address(), &interaction).unwrap();
    cluster.send(Venue::Base, vec![ix], &cluster.oracle).unwrap();

    let events = subscription.drain();
    assert_eq!(events.len(), 1);
    assert_matches!(
        &events[0].event,
        ProgramEvent::DekResponse { interaction: at, id: 0, dek }
            if *at == interaction
                && hex::encode(dek) == "1a96b45e6cfa27144a2a09510f9170744ffc8ff17f67310a5a0fcb2cb3002ef2"
    );
    assert!(cluster.ledger.unsubscribe(subscription.id()));

    let ix = loyal_oracle::instruction::get_dek(&users[0].address(), &context).unwrap();
    assert!(cluster.send(Venue::Base, vec![ix], user).is_err());
}

#[test]
fn test_agent_receives_callback() {
    let (cluster, users) = cluster_with_users(1);
    let payer = &users[0];
    cluster.init_oracle(payer).unwrap();
    let count = cluster.counter().unwrap().count;
    cluster
        .send(
            Venue::Base,
            vec![loyal_agent::instruction::initialize(&payer.address(), count).unwrap()],
            payer,
        )
        .unwrap();

    let agent_address = loyal_agent::agent_address().unwrap();
    let agent: loyal_agent::Agent = cluster.ledger.fetch(Venue::Base, &agent_address).unwrap();
    assert_eq!(agent.context, loyal_oracle::counted_context_address(count).unwrap());
    assert_eq!(cluster.counter().unwrap().count, count + 1);

    cluster
        .send(
            Venue::Base,
            vec![loyal_agent::instruction::query(&payer.address(), &agent.context, 0, "hi").unwrap()],
            payer,
        )
        .unwrap();
    let receipt = cluster.callback(&agent.context, 0, "hello from the model", true).unwrap();
    assert_event_kinds!(receipt.events, ["agent_response", "callback_delivered"]);

    let agent: loyal_agent::Agent = cluster.ledger.fetch(Venue::Base, &agent_address).unwrap();
    assert_eq!(agent.last_response.as_deref(), Some("hello from the model"));
    assert_eq!(agent.responses, 1);
}

#[test]
fn test_foreign_context_cannot_drive_agent_callback() {
    let (cluster, users) = cluster_with_users(2);
    let (payer, attacker) = (&users[0], &users[1]);
    cluster.init_oracle(payer).unwrap();
    let count = cluster.counter().unwrap().count;
    cluster
        .send(
            Venue::Base,
            vec![loyal_agent::instruction::initialize(&payer.address(), count).unwrap()],
            payer,
        )
        .unwrap();
    let agent_address = loyal_agent::agent_address().unwrap();

    // the attacker's own context, pointed at the agent's callback
    let context = cluster.create_context(attacker, None).unwrap();
    let agent_target = CallbackTarget::new(loyal_agent::id(), loyal_agent::instruction::callback_discriminator())
        .with_accounts(vec![AccountMeta::new(agent_address, false)]);
    cluster
        .interact(Venue::Base, attacker, &context, 0, Some("say pwned"), agent_target)
        .unwrap();

    assert_matches!(
        cluster.callback(&context, 0, "pwned", true),
        Err(LoyalError::Unauthorized { .. })
    );
    let agent: loyal_agent::Agent = cluster.ledger.fetch(Venue::Base, &agent_address).unwrap();
    assert_eq!(agent.responses, 0);
    assert_eq!(agent.last_response, None);
    assert!(!cluster.interaction(&context, 0, Venue::Base).unwrap().is_processed);
}

#[test]
fn test_signer_flags_on_extra_accounts_are_dropped() {
    let (cluster, users) = cluster_with_users(1);
    let user = &users[0];
    cluster.init_oracle(user).unwrap();
    let context = cluster.create_context(user, None).unwrap();
    let marked = target().with_accounts(vec![AccountMeta::readonly(Address::from_label("x"), true)]);
    cluster
        .interact(Venue::Base, user, &context, 0, Some("q"), marked)
        .unwrap();
    assert!(cluster.interaction(&context, 0, Venue::Base).unwrap().extra_accounts[0].is_signer);

    let receipt = cluster.callback(&context, 0, "answer", true).unwrap();
    assert_event_kinds!(receipt.events, ["oracle_callback_received", "callback_delivered"]);
    assert!(cluster.interaction(&context, 0, Venue::Base).unwrap().is_processed);
}
