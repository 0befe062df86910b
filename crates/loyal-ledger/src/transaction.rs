//! Signed transactions
//!
//! A transaction is a list of instructions for one venue plus a signature
//! from every key listed as a signer. The message is bincode-encoded and
//! signed as a whole, so signatures cannot be replayed onto a different
//! instruction list or venue.

use loyal_core::{verify_signature, Address, Instruction, Keypair, LoyalError, Result, Signature};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::events::LedgerEvent;
use crate::venue::Venue;

/// The signed part of a transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMessage {
    /// Venue that must execute the instructions
    pub venue: Venue,
    /// Instructions, executed in order and atomically
    pub instructions: Vec<Instruction>,
}

impl TransactionMessage {
    /// Canonical encoding that signatures cover
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

/// A message together with its signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Signed message
    pub message: TransactionMessage,
    /// `(signer, signature)` pairs
    pub signatures: Vec<(Address, Signature)>,
}

impl Transaction {
    /// Build and sign a transaction
    pub fn new_signed(
        venue: Venue,
        instructions: Vec<Instruction>,
        signers: &[&Keypair],
    ) -> Result<Self> {
        let message = TransactionMessage {
            venue,
            instructions,
        };
        let bytes = message.to_bytes()?;
        let signatures = signers
            .iter()
            .map(|keypair| (keypair.address(), keypair.sign(&bytes)))
            .collect();
        Ok(Self {
            message,
            signatures,
        })
    }

    /// Venue the transaction targets
    pub fn venue(&self) -> Venue {
        self.message.venue
    }

    /// Verify every signature and return the set of signing addresses
    pub fn verify(&self) -> Result<BTreeSet<Address>> {
        let bytes = self.message.to_bytes()?;
        let mut signers = BTreeSet::new();
        for (address, signature) in &self.signatures {
            if !verify_signature(address, &bytes, signature) {
                return Err(LoyalError::InvalidSignature { address: *address });
            }
            signers.insert(*address);
        }
        Ok(signers)
    }
}

/// Outcome of a committed transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReceipt {
    /// Slot the transaction was committed in
    pub slot: u64,
    /// Venue that executed it
    pub venue: Venue,
    /// Events emitted, in emission order
    pub events: Vec<LedgerEvent>,
}
