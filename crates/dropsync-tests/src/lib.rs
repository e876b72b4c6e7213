//! dropsync integration test support
//!
//! Shared fixtures for the cross-crate tests under `tests/`: a sync
//! directory in a temporary folder wired to an in-memory remote store.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
pub mod test_utils;

pub use test_utils::SyncHarness;
