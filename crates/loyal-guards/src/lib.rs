//! # Loyal Guards - authorization for program mutations
//!
//! Every mutating entry point asks the guard whether the calling signer
//! holds the role it needs before touching any account. A denial is
//! terminal for the request; since the check runs before any write, the
//! transaction leaves no partial mutation behind.

pub mod guard;
pub mod identity;
pub mod types;

pub use guard::{AuthorizationGuard, Role};
pub use identity::{Identity, IDENTITY_SEED};
pub use types::{GuardDecision, GuardViolation};
