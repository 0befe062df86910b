//! Unified error type for the Loyal programs and the ledger harness
//!
//! Every rejected request surfaces exactly one of these variants as the
//! transaction outcome. A rejected transaction never leaves partial writes.

use crate::identifiers::{Address, Discriminator, ValidatorId};
use serde::{Deserialize, Serialize};

/// Unified error type for all Loyal operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum LoyalError {
    /// Caller failed the authorization guard
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// What the caller was missing
        message: String,
    },

    /// Chat transition attempted from the wrong phase
    #[error("Invalid turn: {message}")]
    InvalidTurn {
        /// Phase the chat was in
        message: String,
    },

    /// Account already exists at the target address
    #[error("Account already initialized: {address}")]
    AlreadyInitialized {
        /// Address that was already in use
        address: Address,
    },

    /// Interaction already received its final callback
    #[error("Interaction already processed: {address}")]
    AlreadyProcessed {
        /// Interaction address
        address: Address,
    },

    /// Delegate/undelegate or a write attempted from the wrong venue state
    #[error("Invalid delegation state: {message}")]
    InvalidDelegationState {
        /// Residency observed and the venue that was asked
        message: String,
    },

    /// Interaction id does not match the context's next sequence number
    #[error("Sequence mismatch: expected interaction {expected}, got {actual}")]
    SequenceMismatch {
        /// The context's `next_interaction`
        expected: u64,
        /// The id supplied by the caller
        actual: u64,
    },

    /// No entry point registered for a `(program, discriminator)` pair
    #[error("Unknown target: program {program} has no entry point {discriminator}")]
    UnknownTarget {
        /// Target program
        program: Address,
        /// Selector that was requested
        discriminator: Discriminator,
    },

    /// Delegation named a validator the ledger does not know
    #[error("Unknown validator: {validator}")]
    UnknownValidator {
        /// Requested validator
        validator: ValidatorId,
    },

    /// Account does not exist on the venue that was read
    #[error("Account not found: {address}")]
    AccountNotFound {
        /// Missing address
        address: Address,
    },

    /// Account data or account list does not have the expected shape
    #[error("Invalid account data: {message}")]
    InvalidAccountData {
        /// What was wrong
        message: String,
    },

    /// An account marked as signer was not signed for
    #[error("Missing signer: {address}")]
    MissingSigner {
        /// Address that should have signed
        address: Address,
    },

    /// A transaction signature failed verification
    #[error("Invalid signature from {address}")]
    InvalidSignature {
        /// Claimed signer
        address: Address,
    },

    /// Callback program does not match the one recorded on the interaction
    #[error("Wrong callback program: expected {expected}, got {actual}")]
    WrongCallbackProgram {
        /// Program recorded on the interaction
        expected: Address,
        /// Program supplied with the callback
        actual: Address,
    },

    /// Oracle response exceeds the configured maximum
    #[error("Response too long: {len} bytes exceeds {max}")]
    ResponseTooLong {
        /// Response size in bytes
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// Cross-program invocation nested too deeply
    #[error("Call depth exceeded: {depth} > {max}")]
    CallDepthExceeded {
        /// Depth that was attempted
        depth: usize,
        /// Configured limit
        max: usize,
    },

    /// Key derivation rejected its inputs
    #[error("Key derivation failed: {message}")]
    KeyDerivation {
        /// Error reported by the derivation
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Configuration could not be loaded or failed validation
    #[error("Config error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },
}

impl LoyalError {
    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create an invalid turn error
    pub fn invalid_turn(message: impl Into<String>) -> Self {
        Self::InvalidTurn {
            message: message.into(),
        }
    }

    /// Create an invalid delegation state error
    pub fn invalid_delegation_state(message: impl Into<String>) -> Self {
        Self::InvalidDelegationState {
            message: message.into(),
        }
    }

    /// Create an invalid account data error
    pub fn invalid_account_data(message: impl Into<String>) -> Self {
        Self::InvalidAccountData {
            message: message.into(),
        }
    }

    /// Create a key derivation error
    pub fn key_derivation(message: impl Into<String>) -> Self {
        Self::KeyDerivation {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Standard Result type for Loyal operations
pub type Result<T> = std::result::Result<T, LoyalError>;

impl From<bincode::Error> for LoyalError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<toml::de::Error> for LoyalError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(err.to_string())
    }
}

impl From<std::io::Error> for LoyalError {
    fn from(err: std::io::Error) -> Self {
        Self::config(format!("io: {err}"))
    }
}
