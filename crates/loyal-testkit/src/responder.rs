//! Off-ledger oracle responder
//!
//! Listens to committed ledger events and answers every request with the
//! oracle key: interactions through `callback_from_llm`, chats through
//! `message_out`. Replies are produced by an [`InferenceBackend`]; a reply
//! of several chunks is delivered as a series of partial callbacks followed
//! by a final one. Each answer is sent to whichever venue currently holds
//! the target account.

use anyhow::Context as _;
use async_trait::async_trait;
use loyal_core::{Address, InteractionStatus, Keypair, ProgramEvent};
use loyal_inference::Chat;
use loyal_ledger::{Ledger, LedgerEvent, Residency, Subscription, Venue};
use loyal_oracle::Interaction;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Produces model output for a prompt
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Reply to `prompt` as one or more chunks
    async fn complete(&self, prompt: &str) -> anyhow::Result<Vec<String>>;
}

/// Backend echoing the prompt back
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoBackend;

#[async_trait]
impl InferenceBackend for EchoBackend {
    async fn complete(&self, prompt: &str) -> anyhow::Result<Vec<String>> {
        Ok(vec![format!("echo: {prompt}")])
    }
}

/// Backend replaying canned replies in order; fails once exhausted
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Vec<String>>>,
}

impl ScriptedBackend {
    /// Backend answering with `replies`, one entry per request
    pub fn new(replies: impl IntoIterator<Item = Vec<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
        }
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn complete(&self, _prompt: &str) -> anyhow::Result<Vec<String>> {
        self.replies
            .lock()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("reply script exhausted"))
    }
}

/// Oracle signer process answering requests from the event bus
pub struct OracleResponder<B: InferenceBackend> {
    ledger: Ledger,
    oracle: Keypair,
    backend: Arc<B>,
    subscription: Subscription,
}

impl<B: InferenceBackend> std::fmt::Debug for OracleResponder<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleResponder")
            .field("oracle", &self.oracle.address())
            .field("subscription", &self.subscription.id())
            .finish_non_exhaustive()
    }
}

impl<B: InferenceBackend> OracleResponder<B> {
    /// Subscribe to `ledger` and answer with `oracle`
    pub fn new(ledger: Ledger, oracle: Keypair, backend: B) -> Self {
        let subscription = ledger.subscribe();
        Self {
            ledger,
            oracle,
            backend: Arc::new(backend),
            subscription,
        }
    }

    fn authority_venue(&self, address: &Address) -> Venue {
        match self.ledger.residency(address) {
            Residency::BaseResident => Venue::Base,
            Residency::Delegated(record) => Venue::Rollup(record.validator),
        }
    }

    /// Answer every event queued so far, including requests raised while
    /// answering. Returns the number of requests answered.
    pub async fn drain(&mut self) -> anyhow::Result<usize> {
        let mut pending: VecDeque<LedgerEvent> = self.subscription.drain().into();
        let mut answered = 0;
        while let Some(event) = pending.pop_front() {
            if self.handle(&event).await? {
                answered += 1;
            }
            pending.extend(self.subscription.drain());
        }
        Ok(answered)
    }

    /// Answer events until the ledger's event bus drops this subscriber
    pub async fn serve(mut self) -> anyhow::Result<()> {
        while let Some(event) = self.subscription.recv().await {
            if let Err(err) = self.handle(&event).await {
                tracing::warn!(error = %err, kind = event.event.kind(), "responder failed");
            }
        }
        Ok(())
    }

    /// Answer one event; returns whether it was a request
    pub async fn handle(&self, event: &LedgerEvent) -> anyhow::Result<bool> {
        match &event.event {
            ProgramEvent::InteractionRequested { interaction, .. }
            | ProgramEvent::InteractionEdited { interaction, .. } => {
                self.answer_interaction(interaction).await
            }
            ProgramEvent::ChatMessageIn { chat, owner } => self.answer_chat(chat, owner).await,
            _ => Ok(false),
        }
    }

    async fn answer_interaction(&self, address: &Address) -> anyhow::Result<bool> {
        let venue = self.authority_venue(address);
        let record: Interaction = self
            .ledger
            .fetch(venue, address)
            .with_context(|| format!("loading interaction {}", address.short()))?;
        if record.is_processed {
            tracing::debug!(interaction = %address.short(), "already answered");
            return Ok(false);
        }

        let prompt = record.text.clone().unwrap_or_default();
        let chunks = match self.backend.complete(&prompt).await {
            Ok(chunks) if !chunks.is_empty() => chunks,
            Ok(_) => vec![String::new()],
            Err(err) => {
                tracing::warn!(interaction = %address.short(), error = %err, "inference failed");
                let ix = loyal_oracle::instruction::update_status(
                    &self.oracle.address(),
                    address,
                    InteractionStatus::Error,
                )?;
                self.ledger.send(venue, vec![ix], &[&self.oracle])?;
                return Ok(true);
            }
        };

        let last = chunks.len() - 1;
        let mut response = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            response.push_str(chunk);
            let ix = loyal_oracle::instruction::callback_from_llm(
                &self.oracle.address(),
                address,
                &record,
                response.clone(),
                i == last,
            )?;
            self.ledger
                .send(venue, vec![ix], &[&self.oracle])
                .with_context(|| format!("delivering chunk {i} to {}", address.short()))?;
        }
        tracing::debug!(interaction = %address.short(), chunks = chunks.len(), "interaction answered");
        Ok(true)
    }

    async fn answer_chat(&self, chat: &Address, owner: &Address) -> anyhow::Result<bool> {
        let venue = self.authority_venue(chat);
        let record: Chat = self.ledger.fetch(venue, chat)?;
        if !record.processing {
            return Ok(false);
        }
        let reply = self.backend.complete(&record.msg_in_text()).await?.concat();
        let ix = loyal_inference::instruction::message_out(&self.oracle.address(), owner, reply)?;
        self.ledger
            .send(venue, vec![ix], &[&self.oracle])
            .with_context(|| format!("answering chat {}", chat.short()))?;
        Ok(true)
    }
}
