//! Instructions and account metas
//!
//! An instruction names its target program, the entry point selector, every
//! account it touches (with signer/writable flags), and bincode-encoded
//! arguments.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::errors::Result;
use crate::identifiers::{Address, Discriminator, ProgramId};

/// One account referenced by an instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountMeta {
    /// Account address
    pub address: Address,
    /// Whether the account must have signed
    pub is_signer: bool,
    /// Whether the program may write the account
    pub is_writable: bool,
}

impl AccountMeta {
    /// A writable account
    pub fn new(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: true,
        }
    }

    /// A read-only account
    pub fn readonly(address: Address, is_signer: bool) -> Self {
        Self {
            address,
            is_signer,
            is_writable: false,
        }
    }
}

/// A call into one program entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    /// Target program
    pub program_id: ProgramId,
    /// Entry point selector
    pub discriminator: Discriminator,
    /// Accounts the entry point reads or writes
    pub accounts: Vec<AccountMeta>,
    /// Encoded arguments
    pub data: Vec<u8>,
}

impl Instruction {
    /// Build an instruction for the named entry point with bincode-encoded args
    pub fn new<A: Serialize>(
        program_id: ProgramId,
        entry_point: &str,
        accounts: Vec<AccountMeta>,
        args: &A,
    ) -> Result<Self> {
        Ok(Self {
            program_id,
            discriminator: Discriminator::for_instruction(entry_point),
            accounts,
            data: bincode::serialize(args)?,
        })
    }

    /// Build an instruction from a raw selector and pre-encoded data
    pub fn with_discriminator(
        program_id: ProgramId,
        discriminator: Discriminator,
        accounts: Vec<AccountMeta>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            program_id,
            discriminator,
            accounts,
            data,
        }
    }

    /// Decode the arguments
    pub fn args<A: DeserializeOwned>(&self) -> Result<A> {
        Ok(bincode::deserialize(&self.data)?)
    }
}
