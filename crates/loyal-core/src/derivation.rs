//! Deterministic account address derivation
//!
//! Program-derived addresses are computed from seed bytes plus the owning
//! program id, so any client can compute where an account lives without a
//! lookup table. A derived address is never a valid ed25519 point, which
//! means no private key can ever sign for it; only the owning program can,
//! through `invoke_signed`.

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};

use crate::errors::{LoyalError, Result};
use crate::identifiers::{Address, ProgramId};

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Maximum number of seeds accepted for one address
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed
pub const MAX_SEED_LEN: usize = 32;

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

fn check_seeds(seeds: &[&[u8]]) -> Result<()> {
    if seeds.len() > MAX_SEEDS {
        return Err(LoyalError::invalid_account_data(format!(
            "too many seeds: {} > {MAX_SEEDS}",
            seeds.len()
        )));
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > MAX_SEED_LEN) {
        return Err(LoyalError::invalid_account_data(format!(
            "seed too long: {} > {MAX_SEED_LEN}",
            seed.len()
        )));
    }
    Ok(())
}

fn digest(seeds: &[&[u8]], program_id: &ProgramId) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id.as_bytes());
    hasher.update(PDA_MARKER);

    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&hasher.finalize());
    bytes
}

/// Compute the address for `seeds` (the last seed being the bump) under `program_id`.
///
/// Fails if the digest happens to land on the curve, in which case the caller
/// must try another bump.
pub fn create_program_address(seeds: &[&[u8]], program_id: &ProgramId) -> Result<Address> {
    check_seeds(seeds)?;
    let bytes = digest(seeds, program_id);
    if is_on_curve(&bytes) {
        return Err(LoyalError::invalid_account_data(
            "derived address lies on the ed25519 curve",
        ));
    }
    Ok(Address(bytes))
}

/// Find the canonical address and bump for `seeds` under `program_id`.
///
/// Bumps are tried from 255 downward; the first off-curve digest wins.
pub fn find_program_address(seeds: &[&[u8]], program_id: &ProgramId) -> Result<(Address, u8)> {
    check_seeds(seeds)?;
    if seeds.len() == MAX_SEEDS {
        return Err(LoyalError::invalid_account_data(format!(
            "too many seeds: no room for a bump after {MAX_SEEDS}"
        )));
    }
    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = seeds.to_vec();
        with_bump.push(&bump_seed);
        let bytes = digest(&with_bump, program_id);
        if !is_on_curve(&bytes) {
            return Ok((Address(bytes), bump));
        }
    }
    Err(LoyalError::invalid_account_data(
        "no viable bump for program address",
    ))
}
