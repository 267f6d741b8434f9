//! # Nemo Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Unit spec and scenario fixtures
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;

/// Route `tracing` output to the test harness.
///
/// Safe to call from every test; only the first call installs the
/// subscriber. Filtering follows `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
