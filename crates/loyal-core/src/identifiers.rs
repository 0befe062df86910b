//! Core identifier types
//!
//! Every account, program, signer, and validator is named by a 32-byte
//! [`Address`]. Entry points and account records are tagged with an 8-byte
//! [`Discriminator`] so that callbacks can be routed without string lookups.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::errors::LoyalError;

/// 32-byte address of an account, program, or signer
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// Wrap raw bytes
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive a stable address from a human-readable label.
    ///
    /// Used for program ids and validator ids, which have no key pair.
    pub fn from_label(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Self(bytes)
    }

    /// Borrow the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Copy out the raw bytes
    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }

    /// Short form for logs
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}…)", self.short())
    }
}

impl FromStr for Address {
    type Err = LoyalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = hex::decode(s)
            .map_err(|e| LoyalError::serialization(format!("invalid address hex: {e}")))?;
        let bytes: [u8; 32] = raw.try_into().map_err(|raw: Vec<u8>| {
            LoyalError::serialization(format!("address must be 32 bytes, got {}", raw.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Program identifier
pub type ProgramId = Address;

/// Identifier of a rollup validator
///
/// A delegated account is bound to exactly one validator at a time.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidatorId(pub Address);

impl ValidatorId {
    /// Wrap an address
    pub const fn new(address: Address) -> Self {
        Self(address)
    }

    /// Derive a validator id from its public name
    pub fn from_label(label: &str) -> Self {
        Self(Address::from_label(label))
    }

    /// Underlying address
    pub fn address(&self) -> Address {
        self.0
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validator-{}", self.0.short())
    }
}

impl fmt::Debug for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ValidatorId({}…)", self.0.short())
    }
}

impl FromStr for ValidatorId {
    type Err = LoyalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_str(s).map(Self)
    }
}

/// Fixed-size selector naming an entry point or an account record type
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Discriminator(pub [u8; 8]);

impl Discriminator {
    /// Discriminator of a program entry point: `sha256("global:<name>")[..8]`
    pub fn for_instruction(name: &str) -> Self {
        Self::hashed("global", name)
    }

    /// Discriminator of an account record: `sha256("account:<TypeName>")[..8]`
    pub fn for_account(type_name: &str) -> Self {
        Self::hashed("account", type_name)
    }

    fn hashed(namespace: &str, name: &str) -> Self {
        let digest = Sha256::digest(format!("{namespace}:{name}").as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self(bytes)
    }

    /// Raw selector bytes
    pub fn to_bytes(self) -> [u8; 8] {
        self.0
    }
}

impl fmt::Display for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Discriminator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Discriminator({})", hex::encode(self.0))
    }
}

impl From<[u8; 8]> for Discriminator {
    fn from(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }
}
