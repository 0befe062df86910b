//! Chat record and its turn-taking state machine
//!
//! Pure transitions: each takes the current record and returns the next
//! one, or an error leaving the caller's copy untouched.
//!
//! - `message_in`: `AwaitingUserMessage` → `AwaitingModelResponse`
//! - `message_out`: `AwaitingModelResponse` → `AwaitingUserMessage`
//!
//! Buffers are overwritten on every turn; no history is kept.

use loyal_core::{AccountState, Address, LoyalError, Result};
use serde::{Deserialize, Serialize};

/// Seed prefix of a user's chat account
pub const CHAT_SEED: &[u8] = b"loyal-chat";

/// One user's conversation slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    /// User allowed to send messages
    pub owner: Address,
    /// Latest user message
    pub msg_in: Vec<u8>,
    /// Latest model response
    pub msg_out: Vec<u8>,
    /// Waiting for the model
    pub processing: bool,
    /// Waiting for the user
    pub user_turn: bool,
}

impl AccountState for Chat {
    const NAME: &'static str = "Chat";
}

/// Whose move it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatPhase {
    /// `processing = false`, `user_turn = true`
    AwaitingUserMessage,
    /// `processing = true`, `user_turn = false`
    AwaitingModelResponse,
}

impl std::fmt::Display for ChatPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatPhase::AwaitingUserMessage => write!(f, "awaiting user message"),
            ChatPhase::AwaitingModelResponse => write!(f, "awaiting model response"),
        }
    }
}

impl Chat {
    /// Fresh chat: empty buffers, user to move
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            msg_in: Vec::new(),
            msg_out: Vec::new(),
            processing: false,
            user_turn: true,
        }
    }

    /// Current phase; any other flag combination is corrupt data
    pub fn phase(&self) -> Result<ChatPhase> {
        match (self.processing, self.user_turn) {
            (false, true) => Ok(ChatPhase::AwaitingUserMessage),
            (true, false) => Ok(ChatPhase::AwaitingModelResponse),
            (processing, user_turn) => Err(LoyalError::invalid_account_data(format!(
                "chat flags out of sync: processing={processing} user_turn={user_turn}"
            ))),
        }
    }

    /// Latest user message as text
    pub fn msg_in_text(&self) -> String {
        String::from_utf8_lossy(&self.msg_in).into_owned()
    }

    /// Latest model response as text
    pub fn msg_out_text(&self) -> String {
        String::from_utf8_lossy(&self.msg_out).into_owned()
    }
}

/// Record a user message and hand the turn to the model.
///
/// Preconditions:
/// - phase is `AwaitingUserMessage`
pub fn message_in(chat: &Chat, text: Vec<u8>) -> Result<Chat> {
    match chat.phase()? {
        ChatPhase::AwaitingUserMessage => Ok(Chat {
            msg_in: text,
            processing: true,
            user_turn: false,
            ..chat.clone()
        }),
        phase => Err(LoyalError::invalid_turn(format!(
            "message_in while {phase}"
        ))),
    }
}

/// Record a model response and hand the turn back to the user.
///
/// Preconditions:
/// - phase is `AwaitingModelResponse`
pub fn message_out(chat: &Chat, text: Vec<u8>) -> Result<Chat> {
    match chat.phase()? {
        ChatPhase::AwaitingModelResponse => Ok(Chat {
            msg_out: text,
            processing: false,
            user_turn: true,
            ..chat.clone()
        }),
        phase => Err(LoyalError::invalid_turn(format!(
            "message_out while {phase}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    fn owner() -> Address {
        Address([1u8; 32])
    }

    #[test]
    fn test_new_chat_awaits_user() {
        let chat = Chat::new(owner());
        assert_eq!(chat.phase().unwrap(), ChatPhase::AwaitingUserMessage);
        assert!(chat.msg_in.is_empty());
        assert!(chat.msg_out.is_empty());
    }

    #[test]
    fn test_full_turn() {
        let chat = Chat::new(owner());
        let chat = message_in(&chat, b"Hello, how are you?".to_vec()).unwrap();
        assert_eq!(chat.msg_in_text(), "Hello, how are you?");
        assert!(chat.processing);
        assert!(!chat.user_turn);

        let chat = message_out(&chat, b"I'm fine, thank you!".to_vec()).unwrap();
        assert_eq!(chat.msg_out_text(), "I'm fine, thank you!");
        assert!(!chat.processing);
        assert!(chat.user_turn);
        // the user message survives the response
        assert_eq!(chat.msg_in_text(), "Hello, how are you?");
    }

    #[test]
    fn test_out_of_turn_rejected() {
        let chat = Chat::new(owner());
        assert_matches!(
            message_out(&chat, b"early".to_vec()),
            Err(LoyalError::InvalidTurn { .. })
        );
        let waiting = message_in(&chat, b"hi".to_vec()).unwrap();
        assert_matches!(
            message_in(&waiting, b"again".to_vec()),
            Err(LoyalError::InvalidTurn { .. })
        );
    }

    #[test]
    fn test_corrupt_flags_detected() {
        let mut chat = Chat::new(owner());
        chat.processing = true;
        assert_matches!(chat.phase(), Err(LoyalError::InvalidAccountData { .. }));
    }

    proptest! {
        #[test]
        fn prop_flags_always_consistent(
            calls in proptest::collection::vec((any::<bool>(), proptest::collection::vec(any::<u8>(), 0..16)), 0..40)
        ) {
            let mut chat = Chat::new(owner());
            for (is_in, text) in calls {
                let before = chat.clone();
                let result = if is_in {
                    message_in(&chat, text)
                } else {
                    message_out(&chat, text)
                };
                match result {
                    Ok(next) => {
                        prop_assert_ne!(next.user_turn, before.user_turn);
                        chat = next;
                    }
                    Err(err) => {
                        prop_assert!(matches!(err, LoyalError::InvalidTurn { .. }), "expected InvalidTurn, got {:?}", err);
                        prop_assert_eq!(&chat, &before);
                    }
                }
                prop_assert!(matches!(
                    (chat.processing, chat.user_turn),
                    (false, true) | (true, false)
                ));
            }
        }
    }
}
