//! Signing key pairs for transaction authors

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::identifiers::Address;

pub use ed25519_dalek::Signature;

/// An ed25519 key pair whose public half is an [`Address`]
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh random key pair
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Deterministic key pair from a 32-byte secret seed
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Address (verifying key bytes) of this key pair
    pub fn address(&self) -> Address {
        Address(self.signing_key.verifying_key().to_bytes())
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// Verify `signature` over `message` against the key behind `address`.
///
/// Program-derived addresses are not valid keys and always fail here.
pub fn verify_signature(address: &Address, message: &[u8], signature: &Signature) -> bool {
    match VerifyingKey::from_bytes(address.as_bytes()) {
        Ok(key) => key.verify(message, signature).is_ok(),
        Err(_) => false,
    }
}
