//! Approval bundles for the approved calls policy.

mod cmd;

pub use cmd::*;
