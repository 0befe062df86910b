//! Structured notifications emitted by programs
//!
//! Events are published by the ledger only after the emitting transaction
//! commits, so a listener never observes an event for a rolled-back write.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifiers::{Address, ProgramId, ValidatorId};

/// Processing status of an interaction, as reported by the oracle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InteractionStatus {
    /// Awaiting (more of) a response
    #[default]
    Pending,
    /// Final response delivered
    Done,
    /// Off-ledger inference failed
    Error,
}

impl fmt::Display for InteractionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Done => write!(f, "done"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Events emitted by the chat, oracle, and agent programs and by the
/// delegation manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgramEvent {
    /// A chat account was created
    ChatInitialized {
        /// Chat account
        chat: Address,
        /// Its owner
        owner: Address,
    },
    /// The user sent a message; the model is now expected to answer
    ChatMessageIn {
        /// Chat account
        chat: Address,
        /// Its owner
        owner: Address,
    },
    /// The model answered; the user may speak again
    ChatMessageOut {
        /// Chat account
        chat: Address,
        /// Its owner
        owner: Address,
    },
    /// A context account was created
    ContextCreated {
        /// Context account
        context: Address,
        /// Its owner
        owner: Address,
        /// Counter value, for counter-keyed contexts
        sequence: Option<u32>,
    },
    /// A new interaction awaits an oracle response
    InteractionRequested {
        /// Parent context
        context: Address,
        /// Interaction account
        interaction: Address,
        /// Position within the context
        id: u64,
    },
    /// A pending interaction was edited before its final callback
    InteractionEdited {
        /// Parent context
        context: Address,
        /// Interaction account
        interaction: Address,
        /// Position within the context
        id: u64,
    },
    /// The oracle delivered (part of) a response and dispatched the callback
    CallbackDelivered {
        /// Interaction account
        interaction: Address,
        /// Program that received the response
        callback_program: ProgramId,
        /// Whether this was the final delivery
        is_processed: bool,
    },
    /// The oracle program's own callback entry point was invoked
    OracleCallbackReceived {
        /// Delivered response
        response: String,
    },
    /// Interaction status changed
    StatusUpdated {
        /// Interaction account
        interaction: Address,
        /// New status
        status: InteractionStatus,
    },
    /// Data encryption key derived for an interaction's attached file
    DekResponse {
        /// Interaction account
        interaction: Address,
        /// Position within its context
        id: u64,
        /// HKDF-SHA256 output keyed by the interaction's master key
        dek: [u8; 32],
    },
    /// The agent program stored an oracle response
    AgentResponse {
        /// Agent account
        agent: Address,
        /// Stored response
        response: String,
        /// Responses received so far
        responses: u64,
    },
    /// Write authority moved to a rollup validator
    Delegated {
        /// Delegated account
        account: Address,
        /// Validator now holding authority
        validator: ValidatorId,
        /// Checkpoint interval, `0` for none
        commit_frequency_ms: u64,
    },
    /// Rollup state was checkpointed to the base layer
    Committed {
        /// Checkpointed account
        account: Address,
        /// Validator holding authority
        validator: ValidatorId,
    },
    /// Write authority returned to the base layer
    Undelegated {
        /// Returned account
        account: Address,
        /// Validator that held authority
        validator: ValidatorId,
    },
}

impl ProgramEvent {
    /// Short name for logs and filters
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatInitialized { .. } => "chat_initialized",
            Self::ChatMessageIn { .. } => "chat_message_in",
            Self::ChatMessageOut { .. } => "chat_message_out",
            Self::ContextCreated { .. } => "context_created",
            Self::InteractionRequested { .. } => "interaction_requested",
            Self::InteractionEdited { .. } => "interaction_edited",
            Self::CallbackDelivered { .. } => "callback_delivered",
            Self::OracleCallbackReceived { .. } => "oracle_callback_received",
            Self::StatusUpdated { .. } => "status_updated",
            Self::DekResponse { .. } => "dek_response",
            Self::AgentResponse { .. } => "agent_response",
            Self::Delegated { .. } => "delegated",
            Self::Committed { .. } => "committed",
            Self::Undelegated { .. } => "undelegated",
        }
    }
}
