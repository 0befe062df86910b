//! Account record encoding
//!
//! A stored record is an 8-byte type discriminator followed by the bincode
//! body. Loading a record under the wrong type fails instead of silently
//! reinterpreting bytes.

use serde::{de::DeserializeOwned, Serialize};

use crate::errors::{LoyalError, Result};
use crate::identifiers::Discriminator;

/// A typed, persistable account record
pub trait AccountState: Serialize + DeserializeOwned {
    /// Type name hashed into the account discriminator
    const NAME: &'static str;

    /// Discriminator prefixed to every encoded record of this type
    fn discriminator() -> Discriminator {
        Discriminator::for_account(Self::NAME)
    }

    /// Encode with the discriminator prefix
    fn try_serialize(&self) -> Result<Vec<u8>> {
        let mut out = Self::discriminator().to_bytes().to_vec();
        out.extend(bincode::serialize(self)?);
        Ok(out)
    }

    /// Decode, checking the discriminator prefix
    fn try_deserialize(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(LoyalError::invalid_account_data(format!(
                "{} record too short: {} bytes",
                Self::NAME,
                data.len()
            )));
        }
        let (prefix, body) = data.split_at(8);
        if prefix != Self::discriminator().to_bytes() {
            return Err(LoyalError::invalid_account_data(format!(
                "discriminator mismatch for {}",
                Self::NAME
            )));
        }
        Ok(bincode::deserialize(body)?)
    }
}
