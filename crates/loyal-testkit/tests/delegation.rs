//! Delegation round trips, validator selection, and periodic checkpoints

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use loyal_core::{LoyalConfig, LoyalError, ValidatorConfig, ValidatorId};
use loyal_ledger::{DelegateConfig, Venue};
use loyal_testkit::{
    assert_base_resident, assert_delegated_to, assert_event_kinds, cluster_with_users,
    KeyTestFixture, TestClusterBuilder,
};
use std::io::Write;

const TWO_ROLLUPS: &str = r#"
[ledger]
slot_duration_ms = 100

[[ledger.validators]]
name = "rollup-near"
region = "local"
latency_ms = 5

[[ledger.validators]]
name = "rollup-far"
region = "remote"
latency_ms = 250

[delegation]
default_commit_frequency_ms = 0
"#;

fn config_from_file() -> LoyalConfig {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TWO_ROLLUPS.as_bytes()).unwrap();
    LoyalConfig::load_from_file(file.path()).unwrap()
}

#[test]
fn test_default_validator_is_fastest() {
    let cluster = TestClusterBuilder::new()
        .with_config(config_from_file())
        .build()
        .unwrap();
    let user = KeyTestFixture::from_seed_string("near");
    cluster.init_chat(&user).unwrap();

    let receipt = cluster
        .delegate_chat(&user, DelegateConfig::default())
        .unwrap();
    assert_event_kinds!(receipt.events, ["delegated"]);
    assert_delegated_to(
        &cluster.ledger,
        &loyal_inference::chat_address(&user.address()).unwrap(),
        Venue::Rollup(ValidatorId::from_label("rollup-near")),
    );
}

#[test]
fn test_explicit_validator() {
    let cluster = TestClusterBuilder::new()
        .with_config(config_from_file())
        .build()
        .unwrap();
    let user = KeyTestFixture::from_seed_string("far");
    cluster.init_chat(&user).unwrap();
    let far = Venue::Rollup(ValidatorId::from_label("rollup-far"));

    cluster
        .delegate_chat(
            &user,
            DelegateConfig::to_validator(ValidatorId::from_label("rollup-far")),
        )
        .unwrap();
    assert_delegated_to(
        &cluster.ledger,
        &loyal_inference::chat_address(&user.address()).unwrap(),
        far,
    );

    // the other rollup has no authority
    assert_matches!(
        cluster.message_in(cluster.rollup(), &user, "hi"),
        Err(LoyalError::InvalidDelegationState { .. })
    );
    cluster.message_in(far, &user, "hi").unwrap();
}

#[test]
fn test_unknown_validator_rejected() {
    let (cluster, users) = cluster_with_users(1);
    let user = &users[0];
    cluster.init_chat(user).unwrap();

    assert_matches!(
        cluster.delegate_chat(
            user,
            DelegateConfig::to_validator(ValidatorId::from_label("nowhere"))
        ),
        Err(LoyalError::UnknownValidator { .. })
    );
    assert_base_resident(
        &cluster.ledger,
        &loyal_inference::chat_address(&user.address()).unwrap(),
    );
    assert_matches!(
        cluster.message_in(
            Venue::Rollup(ValidatorId::from_label("nowhere")),
            user,
            "hi"
        ),
        Err(LoyalError::UnknownValidator { .. })
    );
}

#[test]
fn test_periodic_checkpoint() {
    let cluster = TestClusterBuilder::new()
        .with_commit_frequency(1_000)
        .build()
        .unwrap();
    let user = KeyTestFixture::from_seed_string("checkpointed");
    let chat_address = loyal_inference::chat_address(&user.address()).unwrap();
    cluster.init_chat(&user).unwrap();
    cluster
        .delegate_chat(&user, DelegateConfig::default())
        .unwrap();
    let rollup = cluster.rollup();

    cluster.message_in(rollup, &user, "saved soon").unwrap();
    assert_eq!(cluster.chat(&user, Venue::Base).unwrap().msg_in_text(), "");

    let events = cluster.ledger.advance_clock(1_000);
    assert_event_kinds!(events, ["committed"]);
    assert_eq!(
        cluster.chat(&user, Venue::Base).unwrap().msg_in_text(),
        "saved soon"
    );
    // a checkpoint does not end the delegation
    assert_delegated_to(&cluster.ledger, &chat_address, rollup);
    assert!(cluster.ledger.advance_clock(10).is_empty());
}

#[test]
fn test_zero_frequency_disables_checkpoints() {
    let cluster = TestClusterBuilder::new()
        .with_commit_frequency(0)
        .build()
        .unwrap();
    let user = KeyTestFixture::from_seed_string("manual");
    cluster.init_chat(&user).unwrap();
    cluster
        .delegate_chat(&user, DelegateConfig::default())
        .unwrap();
    cluster.message_in(cluster.rollup(), &user, "held").unwrap();

    assert!(cluster.ledger.advance_clock(1_000_000).is_empty());
    assert_eq!(cluster.chat(&user, Venue::Base).unwrap().msg_in_text(), "");
}

#[test]
fn test_round_trip_preserves_content() {
    let (cluster, users) = cluster_with_users(1);
    let user = &users[0];
    let chat_address = loyal_inference::chat_address(&user.address()).unwrap();
    cluster.init_chat(user).unwrap();
    cluster.message_in(Venue::Base, user, "before").unwrap();
    let before = cluster.ledger.get_account(Venue::Base, &chat_address).unwrap();

    cluster
        .delegate_chat(user, DelegateConfig::default())
        .unwrap();
    cluster.undelegate_chat(user).unwrap();

    assert_eq!(
        cluster.ledger.get_account(Venue::Base, &chat_address).unwrap(),
        before
    );
    assert_base_resident(&cluster.ledger, &chat_address);
}

#[test]
fn test_commit_requested_on_base_rejected() {
    let (cluster, users) = cluster_with_users(1);
    let user = &users[0];
    cluster.init_chat(user).unwrap();
    cluster
        .delegate_chat(user, DelegateConfig::default())
        .unwrap();

    let ix =
        loyal_inference::instruction::commit_chat(&user.address(), &user.address()).unwrap();
    assert_matches!(
        cluster.send(Venue::Base, vec![ix.clone()], user),
        Err(LoyalError::InvalidDelegationState { .. })
    );
    let receipt = cluster.send(cluster.rollup(), vec![ix], user).unwrap();
    assert_event_kinds!(receipt.events, ["committed"]);
}

#[test]
fn test_config_round_trips_through_builder() {
    let config = config_from_file();
    assert_eq!(config.ledger.validators.len(), 2);
    assert_eq!(
        config.fastest_validator().map(|v| v.name.as_str()),
        Some("rollup-near")
    );

    let extra = ValidatorConfig::new("rollup-extra", "edge", 1);
    let mut with_extra = config.clone();
    with_extra.ledger.validators.push(extra.clone());
    let cluster = TestClusterBuilder::new()
        .with_config(with_extra)
        .build()
        .unwrap();
    assert_eq!(cluster.rollup(), Venue::Rollup(extra.id()));
}
