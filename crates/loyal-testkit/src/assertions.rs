//! Assertion helpers for ledger state and events

use loyal_core::Address;
use loyal_inference::{Chat, ChatPhase};
use loyal_ledger::{Ledger, LedgerEvent, Residency, Venue};

/// Assert the kinds of a sequence of events, in order
#[macro_export]
macro_rules! assert_event_kinds {
    ($events:expr, [$($kind:expr),* $(,)?]) => {
        assert_eq!(
            $crate::assertions::event_kinds(&$events),
            vec![$($kind),*],
            "unexpected event sequence"
        )
    };
}

/// Kinds of `events`, in order
pub fn event_kinds(events: &[LedgerEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event.kind()).collect()
}

/// Assert a chat is in `expected` phase with consistent flags
pub fn assert_chat_phase(chat: &Chat, expected: ChatPhase) {
    match chat.phase() {
        Ok(phase) => assert_eq!(phase, expected, "chat phase mismatch"),
        Err(err) => panic!("chat flags inconsistent: {err}"),
    }
}

/// Assert `address` is delegated to the rollup `venue`
pub fn assert_delegated_to(ledger: &Ledger, address: &Address, venue: Venue) {
    match (ledger.residency(address), venue) {
        (Residency::Delegated(record), Venue::Rollup(validator)) => assert_eq!(
            record.validator, validator,
            "account {} delegated to the wrong validator",
            address.short()
        ),
        (residency, venue) => panic!(
            "account {} is {residency}, expected delegation to {venue}",
            address.short()
        ),
    }
}

/// Assert `address` is base-resident
pub fn assert_base_resident(ledger: &Ledger, address: &Address) {
    assert_eq!(
        ledger.residency(address),
        Residency::BaseResident,
        "account {} should be base-resident",
        address.short()
    );
}
