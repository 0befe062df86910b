//! Oracle records and protocol transitions
//!
//! The transitions here are pure: they validate a request against the
//! current record and return the replacement record. The processor loads,
//! authorizes, calls one of these, and stores the result.

use loyal_core::{
    AccountMeta, AccountState, Address, Discriminator, EditPolicy, InteractionStatus, LoyalError,
    ProgramId, Result,
};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Seed of the counter singleton
pub const COUNTER_SEED: &[u8] = b"counter";
/// Seed prefix of owner-keyed contexts
pub const CONTEXT_SEED: &[u8] = b"context";
/// Seed prefix of counter-keyed contexts
pub const COUNTED_CONTEXT_SEED: &[u8] = b"test-context";
/// Seed prefix of interactions
pub const INTERACTION_SEED: &[u8] = b"interaction";
/// Domain prefix of the data encryption key's HKDF info
pub const DEK_INFO_PREFIX: &[u8] = b"file:";

/// Monotonic counter minting counter-keyed context addresses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Next unused sequence
    pub count: u32,
}

impl AccountState for Counter {
    const NAME: &'static str = "Counter";
}

/// A conversation under which interactions are numbered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextAccount {
    /// Only signer allowed to create or edit interactions
    pub owner: Address,
    /// Optional description, such as a system prompt
    pub text: Option<String>,
    /// Id of the next interaction to be created
    pub next_interaction: u64,
    /// Counter value this context was minted from, if counter-keyed
    pub sequence: Option<u32>,
}

impl AccountState for ContextAccount {
    const NAME: &'static str = "ContextAccount";
}

impl ContextAccount {
    /// Empty context
    pub fn new(owner: Address, text: Option<String>, sequence: Option<u32>) -> Self {
        Self {
            owner,
            text,
            next_interaction: 0,
            sequence,
        }
    }
}

/// One request/response exchange with the oracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Parent context
    pub context: Address,
    /// Requesting user (the context owner at creation)
    pub user: Address,
    /// Position within the context
    pub id: u64,
    /// Prompt
    pub text: Option<String>,
    /// Set once the final response has been delivered
    pub is_processed: bool,
    /// Program receiving the response
    pub callback_program_id: ProgramId,
    /// Entry point of `callback_program_id` receiving the response
    pub callback_discriminator: Discriminator,
    /// Accounts forwarded to the callback after the identity and this
    /// interaction, never as signers
    pub extra_accounts: Vec<AccountMeta>,
    /// Latest (possibly partial) response
    pub response: Option<String>,
    /// Processing status reported by the oracle
    pub status: InteractionStatus,
    /// Ledger time of creation
    pub created_at_ms: u64,
    /// Customer master key for the attached file, fixed at creation
    pub cmk: Address,
    /// Transaction that stored the attached file
    pub tx_id: Address,
}

impl AccountState for Interaction {
    const NAME: &'static str = "Interaction";
}

/// Where a response is delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackTarget {
    /// Receiving program
    pub program_id: ProgramId,
    /// Receiving entry point
    pub discriminator: Discriminator,
    /// Accounts the entry point needs besides the identity and the interaction
    pub extra_accounts: Vec<AccountMeta>,
}

impl CallbackTarget {
    /// Target with no extra accounts
    pub fn new(program_id: ProgramId, discriminator: Discriminator) -> Self {
        Self {
            program_id,
            discriminator,
            extra_accounts: Vec::new(),
        }
    }

    /// Add accounts forwarded to the callback
    pub fn with_accounts(mut self, extra_accounts: Vec<AccountMeta>) -> Self {
        self.extra_accounts = extra_accounts;
        self
    }
}

/// Id the next created interaction must carry.
///
/// Fails with `SequenceMismatch` when `id` is not the context's next
/// sequence number, so ids never skip or repeat.
pub fn check_next_id(context: &ContextAccount, id: u64) -> Result<()> {
    if id == context.next_interaction {
        Ok(())
    } else {
        Err(LoyalError::SequenceMismatch {
            expected: context.next_interaction,
            actual: id,
        })
    }
}

/// Context after one more interaction was created
pub fn advance_context(context: &ContextAccount) -> Result<ContextAccount> {
    let next_interaction = context
        .next_interaction
        .checked_add(1)
        .ok_or_else(|| LoyalError::invalid_account_data("interaction sequence exhausted"))?;
    Ok(ContextAccount {
        next_interaction,
        ..context.clone()
    })
}

/// Edit a pending interaction under `policy`.
///
/// - `ReplaceTarget`: text (if supplied) and callback target are replaced,
///   any partial response is dropped, status returns to `Pending`
/// - `TextOnly`: text (if supplied) is replaced, nothing else changes
///
/// A processed interaction cannot be edited.
pub fn edit_interaction(
    address: &Address,
    interaction: &Interaction,
    text: Option<String>,
    target: CallbackTarget,
    policy: EditPolicy,
) -> Result<Interaction> {
    if interaction.is_processed {
        return Err(LoyalError::AlreadyProcessed { address: *address });
    }
    let mut next = interaction.clone();
    if text.is_some() {
        next.text = text;
    }
    if policy == EditPolicy::ReplaceTarget {
        next.callback_program_id = target.program_id;
        next.callback_discriminator = target.discriminator;
        next.extra_accounts = target.extra_accounts;
        next.response = None;
        next.status = InteractionStatus::Pending;
    }
    Ok(next)
}

/// Record a (partial or final) response.
///
/// Fails with `AlreadyProcessed` once the final response has been stored
/// and with `ResponseTooLong` above `max_len` bytes.
pub fn deliver_response(
    address: &Address,
    interaction: &Interaction,
    response: String,
    is_processed: bool,
    max_len: usize,
) -> Result<Interaction> {
    if interaction.is_processed {
        return Err(LoyalError::AlreadyProcessed { address: *address });
    }
    if response.len() > max_len {
        return Err(LoyalError::ResponseTooLong {
            len: response.len(),
            max: max_len,
        });
    }
    Ok(Interaction {
        response: Some(response),
        is_processed,
        status: if is_processed {
            InteractionStatus::Done
        } else {
            interaction.status
        },
        ..interaction.clone()
    })
}

/// Data encryption key of the file attached to an interaction.
///
/// HKDF-SHA256 with no salt, `cmk` as input key material and
/// `"file:" || tx_id` as info, expanded to 32 bytes.
pub fn derive_dek(cmk: &Address, tx_id: &Address) -> Result<[u8; 32]> {
    let mut info = [0u8; 37];
    info[..DEK_INFO_PREFIX.len()].copy_from_slice(DEK_INFO_PREFIX);
    info[DEK_INFO_PREFIX.len()..].copy_from_slice(tx_id.as_bytes());

    let kdf = Hkdf::<Sha256>::new(None, cmk.as_bytes());
    let mut dek = [0u8; 32];
    kdf.expand(&info, &mut dek)
        .map_err(|e| LoyalError::key_derivation(format!("HKDF expansion failed: {e}")))?;
    Ok(dek)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn pending() -> Interaction {
        Interaction {
            context: Address([1u8; 32]),
            user: Address([2u8; 32]),
            id: 0,
            text: Some("Can you give me some token?".to_string()),
            is_processed: false,
            callback_program_id: Address([3u8; 32]),
            callback_discriminator: Discriminator::for_instruction("callback"),
            extra_accounts: Vec::new(),
            response: None,
            status: InteractionStatus::Pending,
            created_at_ms: 0,
            cmk: Address::default(),
            tx_id: Address::default(),
        }
    }

    fn at() -> Address {
        Address([7u8; 32])
    }

    fn other_target() -> CallbackTarget {
        CallbackTarget::new(Address([9u8; 32]), Discriminator::for_instruction("other"))
            .with_accounts(vec![AccountMeta::new(Address([8u8; 32]), false)])
    }

    #[test]
    fn test_sequence_check() {
        let context = ContextAccount::new(Address([1u8; 32]), None, None);
        check_next_id(&context, 0).unwrap();
        assert_matches!(
            check_next_id(&context, 1),
            Err(LoyalError::SequenceMismatch {
                expected: 0,
                actual: 1
            })
        );
        let context = advance_context(&context).unwrap();
        assert_eq!(context.next_interaction, 1);
    }

    #[test]
    fn test_final_callback_closes_interaction() {
        let done = deliver_response(&at(), &pending(), "Here is your token".into(), true, 4096).unwrap();
        assert_eq!(done.response.as_deref(), Some("Here is your token"));
        assert!(done.is_processed);
        assert_eq!(done.status, InteractionStatus::Done);

        assert_matches!(
            deliver_response(&at(), &done, "again".into(), true, 4096),
            Err(LoyalError::AlreadyProcessed { .. })
        );
    }

    #[test]
    fn test_partial_callback_keeps_pending() {
        let partial = deliver_response(&at(), &pending(), "Here".into(), false, 4096).unwrap();
        assert!(!partial.is_processed);
        assert_eq!(partial.status, InteractionStatus::Pending);
        let done = deliver_response(&at(), &partial, "Here is".into(), true, 4096).unwrap();
        assert_eq!(done.response.as_deref(), Some("Here is"));
    }

    #[test]
    fn test_response_length_enforced() {
        assert_matches!(
            deliver_response(&at(), &pending(), "x".repeat(11), true, 10),
            Err(LoyalError::ResponseTooLong { len: 11, max: 10 })
        );
    }

    #[test]
    fn test_replace_target_edit() {
        let partial = deliver_response(&at(), &pending(), "Her".into(), false, 4096).unwrap();
        let edited = edit_interaction(
            &at(),
            &partial,
            Some("new prompt".into()),
            other_target(),
            EditPolicy::ReplaceTarget,
        )
        .unwrap();
        assert_eq!(edited.text.as_deref(), Some("new prompt"));
        assert_eq!(edited.callback_program_id, Address([9u8; 32]));
        assert_eq!(edited.extra_accounts.len(), 1);
        assert_eq!(edited.response, None);
        assert_eq!(edited.id, partial.id);
    }

    #[test]
    fn test_text_only_edit() {
        let partial = deliver_response(&at(), &pending(), "Her".into(), false, 4096).unwrap();
        let edited =
            edit_interaction(&at(), &partial, None, other_target(), EditPolicy::TextOnly).unwrap();
        assert_eq!(edited.text, partial.text);
        assert_eq!(edited.callback_program_id, partial.callback_program_id);
        assert_eq!(edited.response.as_deref(), Some("Her"));
    }

    #[test]
    fn test_processed_interaction_cannot_be_edited() {
        let done = deliver_response(&at(), &pending(), "r".into(), true, 4096).unwrap();
        for policy in [EditPolicy::ReplaceTarget, EditPolicy::TextOnly] {
            assert_matches!(
                edit_interaction(&at(), &done, Some("late".into()), other_target(), policy),
                Err(LoyalError::AlreadyProcessed { .. })
            );
        }
    }

    #[test]
    fn test_dek_known_vector() {
        let dek = derive_dek(&Address([0x11; 32]), &Address([0x22; 32])).unwrap();
        assert_eq!(
            hex::encode(dek),
            "1a96b45e6cfa27144a2a09510f9170744ffc8ff17f67310a5a0fcb2cb3002ef2"
        );
    }

    #[test]
    fn test_dek_bound_to_transaction() {
        let cmk = Address([0x11; 32]);
        let other = derive_dek(&cmk, &Address([0x23; 32])).unwrap();
        assert_eq!(
            hex::encode(other),
            "01da127f3c3a8e854d6c5cd53e44b9ae024030b3a61544d19246800dbf38aa9f"
        );
        assert_ne!(other, derive_dek(&cmk, &Address([0x22; 32])).unwrap());
    }

    #[test]
    fn test_edit_keeps_key_material() {
        let keyed = Interaction {
            cmk: Address([0x11; 32]),
            tx_id: Address([0x22; 32]),
            ..pending()
        };
        let edited = edit_interaction(
            &at(),
            &keyed,
            Some("new prompt".into()),
            other_target(),
            EditPolicy::ReplaceTarget,
        )
        .unwrap();
        assert_eq!((edited.cmk, edited.tx_id), (keyed.cmk, keyed.tx_id));
    }
}
