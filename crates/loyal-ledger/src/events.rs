//! Event bus for off-ledger listeners
//!
//! Publication is fire-and-forget: each committed event is offered once to
//! every live subscriber. A subscriber whose receiver was dropped is pruned
//! on the next publish. No ordering is promised across accounts beyond the
//! order in which transactions commit.

use loyal_core::{ProgramEvent, ProgramId};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};

use crate::venue::Venue;

/// A program event together with where and when it was committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEvent {
    /// Slot of the emitting transaction
    pub slot: u64,
    /// Venue that executed the transaction
    pub venue: Venue,
    /// Emitting program
    pub program_id: ProgramId,
    /// Payload
    pub event: ProgramEvent,
}

/// Handle identifying a subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Receiving side of a subscription
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: UnboundedReceiver<LedgerEvent>,
}

impl Subscription {
    /// Identifier to pass to [`EventBus::unsubscribe`]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next event; `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<LedgerEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is queued
    pub fn try_recv(&mut self) -> Option<LedgerEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Drain every queued event
    pub fn drain(&mut self) -> Vec<LedgerEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[derive(Debug, Default)]
struct BusInner {
    next_id: u64,
    subscribers: BTreeMap<SubscriptionId, UnboundedSender<LedgerEvent>>,
}

/// Fan-out of committed events to subscribers
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<BusInner>>,
}

impl EventBus {
    /// New bus with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;
        inner.subscribers.insert(id, sender);
        Subscription { id, receiver }
    }

    /// Remove a subscriber; returns whether it was registered
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.lock().subscribers.remove(&id).is_some()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    /// Offer each event once to every subscriber
    pub fn publish(&self, events: &[LedgerEvent]) {
        if events.is_empty() {
            return;
        }
        let mut inner = self.inner.lock();
        inner.subscribers.retain(|id, sender| {
            let alive = events.iter().all(|event| sender.send(event.clone()).is_ok());
            if !alive {
                tracing::debug!(subscription = id.0, "pruning closed subscription");
            }
            alive
        });
    }
}
