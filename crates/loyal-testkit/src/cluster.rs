//! In-process cluster with every Loyal program registered
//!
//! Wraps a [`Ledger`] together with the oracle key and convenience calls for
//! the flows the integration tests drive: chat turns, oracle interactions,
//! and delegation round trips.

use loyal_core::{Address, EditPolicy, Instruction, LoyalConfig, Result};
use loyal_inference::{Chat, ChatProgram};
use loyal_ledger::{
    DelegateConfig, Ledger, ProgramRegistry, Residency, TransactionReceipt, Venue,
};
use loyal_oracle::{
    CallbackTarget, ContextAccount, Counter, InteractArgs, Interaction, OracleProgram,
};
use loyal_agent::AgentProgram;
use std::sync::Arc;

use crate::keys::KeyTestFixture;

/// Builder for [`TestCluster`]
#[derive(Debug, Clone)]
pub struct TestClusterBuilder {
    config: LoyalConfig,
    oracle_seed: String,
}

impl Default for TestClusterBuilder {
    fn default() -> Self {
        Self {
            config: LoyalConfig::default(),
            oracle_seed: "loyal-oracle-signer".to_string(),
        }
    }
}

impl TestClusterBuilder {
    /// Builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an explicit configuration; the oracle signer is still
    /// replaced by the cluster's oracle key
    pub fn with_config(mut self, config: LoyalConfig) -> Self {
        self.config = config;
        self
    }

    /// Edit semantics for pending interactions
    pub fn with_edit_policy(mut self, policy: EditPolicy) -> Self {
        self.config.oracle.edit_policy = policy;
        self
    }

    /// Default periodic checkpoint interval for delegations
    pub fn with_commit_frequency(mut self, commit_frequency_ms: u64) -> Self {
        self.config.delegation.default_commit_frequency_ms = commit_frequency_ms;
        self
    }

    /// Upper bound on stored responses
    pub fn with_max_response_len(mut self, max_response_len: usize) -> Self {
        self.config.oracle.max_response_len = max_response_len;
        self
    }

    /// Seed label of the oracle key
    pub fn with_oracle_seed(mut self, seed: impl Into<String>) -> Self {
        self.oracle_seed = seed.into();
        self
    }

    /// Register the programs and create the ledger
    pub fn build(self) -> Result<TestCluster> {
        let oracle = KeyTestFixture::from_seed_string(&self.oracle_seed);
        let config = self.config.with_oracle_signer(oracle.address());

        let mut registry = ProgramRegistry::new();
        registry.register(Arc::new(ChatProgram))?;
        registry.register(Arc::new(OracleProgram))?;
        registry.register(Arc::new(AgentProgram))?;

        Ok(TestCluster {
            ledger: Ledger::new(config, registry)?,
            oracle,
        })
    }
}

/// A ledger with the chat, oracle, and agent programs and an oracle key
#[derive(Debug, Clone)]
pub struct TestCluster {
    /// The settlement layer
    pub ledger: Ledger,
    /// Trusted oracle signer
    pub oracle: KeyTestFixture,
}

impl TestCluster {
    /// Cluster with default configuration
    pub fn new() -> Result<Self> {
        TestClusterBuilder::new().build()
    }

    /// Rollup venue of the lowest-latency validator
    pub fn rollup(&self) -> Venue {
        self.ledger
            .config()
            .fastest_validator()
            .map(|v| Venue::Rollup(v.id()))
            .unwrap_or(Venue::Base)
    }

    /// Venue currently holding write authority over `address`
    pub fn authority_venue(&self, address: &Address) -> Venue {
        match self.ledger.residency(address) {
            Residency::BaseResident => Venue::Base,
            Residency::Delegated(record) => Venue::Rollup(record.validator),
        }
    }

    /// Sign and send on `venue`
    pub fn send(
        &self,
        venue: Venue,
        instructions: Vec<Instruction>,
        signer: &KeyTestFixture,
    ) -> Result<TransactionReceipt> {
        self.ledger.send(venue, instructions, &[signer.keypair()])
    }

    /// Create `user`'s chat
    pub fn init_chat(&self, user: &KeyTestFixture) -> Result<TransactionReceipt> {
        self.send(
            Venue::Base,
            vec![loyal_inference::instruction::initialize(&user.address())?],
            user,
        )
    }

    /// `user`'s chat as seen from `venue`
    pub fn chat(&self, user: &KeyTestFixture, venue: Venue) -> Result<Chat> {
        self.ledger
            .fetch(venue, &loyal_inference::chat_address(&user.address())?)
    }

    /// User turn
    pub fn message_in(
        &self,
        venue: Venue,
        user: &KeyTestFixture,
        text: &str,
    ) -> Result<TransactionReceipt> {
        self.send(
            venue,
            vec![loyal_inference::instruction::message_in(&user.address(), text)?],
            user,
        )
    }

    /// Model turn, signed by the oracle
    pub fn message_out(
        &self,
        venue: Venue,
        user: &KeyTestFixture,
        text: &str,
    ) -> Result<TransactionReceipt> {
        self.send(
            venue,
            vec![loyal_inference::instruction::message_out(
                &self.oracle.address(),
                &user.address(),
                text,
            )?],
            &self.oracle,
        )
    }

    /// Create the oracle's identity and counter
    pub fn init_oracle(&self, payer: &KeyTestFixture) -> Result<TransactionReceipt> {
        self.send(
            Venue::Base,
            vec![loyal_oracle::instruction::initialize(&payer.address())?],
            payer,
        )
    }

    /// Create `owner`'s owner-keyed context and return its address
    pub fn create_context(&self, owner: &KeyTestFixture, text: Option<&str>) -> Result<Address> {
        self.send(
            Venue::Base,
            vec![loyal_oracle::instruction::create_context(
                &owner.address(),
                text.map(str::to_string),
            )?],
            owner,
        )?;
        loyal_oracle::context_address(&owner.address())
    }

    /// Create a counter-keyed context for `owner` and return its address
    pub fn create_counted_context(
        &self,
        owner: &KeyTestFixture,
        text: Option<&str>,
    ) -> Result<Address> {
        let count = self.counter()?.count;
        self.send(
            Venue::Base,
            vec![loyal_oracle::instruction::create_counted_context(
                &owner.address(),
                count,
                text.map(str::to_string),
            )?],
            owner,
        )?;
        loyal_oracle::counted_context_address(count)
    }

    /// The oracle counter
    pub fn counter(&self) -> Result<Counter> {
        self.ledger
            .fetch(Venue::Base, &loyal_oracle::counter_address()?)
    }

    /// A context as seen from `venue`
    pub fn context(&self, context: &Address, venue: Venue) -> Result<ContextAccount> {
        self.ledger.fetch(venue, context)
    }

    /// Interaction `id` of `context` as seen from `venue`
    pub fn interaction(&self, context: &Address, id: u64, venue: Venue) -> Result<Interaction> {
        self.ledger
            .fetch(venue, &loyal_oracle::interaction_address(context, id)?)
    }

    /// Target delivering responses to the oracle's own callback entry point
    pub fn oracle_callback_target() -> CallbackTarget {
        CallbackTarget::new(
            loyal_oracle::id(),
            loyal_oracle::instruction::callback_from_oracle_discriminator(),
        )
    }

    /// Create or edit interaction `id`
    pub fn interact(
        &self,
        venue: Venue,
        user: &KeyTestFixture,
        context: &Address,
        id: u64,
        text: Option<&str>,
        target: CallbackTarget,
    ) -> Result<TransactionReceipt> {
        self.send(
            venue,
            vec![loyal_oracle::instruction::interact_with_llm(
                &user.address(),
                context,
                InteractArgs::new(id, text.map(str::to_string), target),
            )?],
            user,
        )
    }

    /// Deliver `response` to interaction `id`, signed by the oracle, on the
    /// venue holding the interaction
    pub fn callback(
        &self,
        context: &Address,
        id: u64,
        response: &str,
        is_processed: bool,
    ) -> Result<TransactionReceipt> {
        let address = loyal_oracle::interaction_address(context, id)?;
        let venue = self.authority_venue(&address);
        let record: Interaction = self.ledger.fetch(venue, &address)?;
        self.send(
            venue,
            vec![loyal_oracle::instruction::callback_from_llm(
                &self.oracle.address(),
                &address,
                &record,
                response,
                is_processed,
            )?],
            &self.oracle,
        )
    }

    /// Delegate `user`'s chat
    pub fn delegate_chat(
        &self,
        user: &KeyTestFixture,
        config: DelegateConfig,
    ) -> Result<TransactionReceipt> {
        self.send(
            Venue::Base,
            vec![loyal_inference::instruction::delegate_chat(&user.address(), config)?],
            user,
        )
    }

    /// Undelegate `user`'s chat from the venue holding it
    pub fn undelegate_chat(&self, user: &KeyTestFixture) -> Result<TransactionReceipt> {
        let chat = loyal_inference::chat_address(&user.address())?;
        self.send(
            self.authority_venue(&chat),
            vec![loyal_inference::instruction::undelegate_chat(
                &user.address(),
                &user.address(),
            )?],
            user,
        )
    }
}
