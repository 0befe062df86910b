//! Deterministic test keys

use loyal_core::{Address, Keypair};
use sha2::{Digest, Sha256};

/// Named key pair with a reproducible address
#[derive(Debug, Clone)]
pub struct KeyTestFixture {
    keypair: Keypair,
    label: String,
}

impl KeyTestFixture {
    /// Key pair from raw seed bytes
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(seed),
            label: hex_label(seed),
        }
    }

    /// Key pair seeded by `sha256(label)`
    pub fn from_seed_string(label: &str) -> Self {
        let digest = Sha256::digest(label.as_bytes());
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&digest);
        Self {
            keypair: Keypair::from_seed(&seed),
            label: label.to_string(),
        }
    }

    /// Signing key pair
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }

    /// Public address
    pub fn address(&self) -> Address {
        self.keypair.address()
    }

    /// Label used to derive the key
    pub fn label(&self) -> &str {
        &self.label
    }
}

fn hex_label(seed: &[u8; 32]) -> String {
    seed[..4].iter().map(|b| format!("{b:02x}")).collect()
}

/// Builder for several related test keys
#[derive(Debug)]
pub struct KeySetBuilder {
    count: usize,
    base_seed: String,
}

impl KeySetBuilder {
    /// Builder for `count` keys
    pub fn new(count: usize) -> Self {
        Self {
            count,
            base_seed: "loyal-test-user".to_string(),
        }
    }

    /// Use a different seed prefix
    pub fn with_base_seed(mut self, seed: impl Into<String>) -> Self {
        self.base_seed = seed.into();
        self
    }

    /// Keys labelled `<base>-0`, `<base>-1`, ...
    pub fn build(self) -> Vec<KeyTestFixture> {
        (0..self.count)
            .map(|i| KeyTestFixture::from_seed_string(&format!("{}-{i}", self.base_seed)))
            .collect()
    }
}
