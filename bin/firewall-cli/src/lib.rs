//! Library half of the `fwctl` command line tool.
//!
//! Computes call and vector hashes, builds and signs approval bundles, and simulates scenarios of
//! protected calls against an in-memory ledger.

mod cmd;
pub use cmd::*;

/// Argument parsing, errors and logging shared by every command.
pub mod common;

/// Approval bundle digests and signatures.
pub mod bundle;

/// Call and vector hashes.
pub mod hash;

/// Scenario simulation.
pub mod simulate;
