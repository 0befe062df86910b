//! Loyal Testing Infrastructure
//!
//! Shared fixtures for the integration tests under `tests/`: deterministic
//! keys, a [`TestCluster`] with every program registered, assertion helpers,
//! test log setup, and the [`OracleResponder`] standing in for the
//! off-ledger inference service.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

pub mod assertions;
pub mod cluster;
pub mod keys;
pub mod logging;
pub mod responder;

pub use assertions::*;
pub use cluster::{TestCluster, TestClusterBuilder};
pub use keys::{KeySetBuilder, KeyTestFixture};
pub use logging::init_test_tracing;
pub use responder::{EchoBackend, InferenceBackend, OracleResponder, ScriptedBackend};

/// Cluster plus `n` user keys
pub fn cluster_with_users(n: usize) -> (TestCluster, Vec<KeyTestFixture>) {
    init_test_tracing();
    let cluster = TestCluster::new().expect("default cluster");
    (cluster, KeySetBuilder::new(n).build())
}
