//! Scenario simulation.
//!
//! A scenario deploys firewalls, policies and consumers from a [`HostConfig`], seeds an in-memory
//! ledger and runs a list of transactions. Each transaction is a list of protected calls whose
//! guarded logic is described as effects: transfers, storage writes, nested calls, internally
//! protected sections and explicit reverts.
//!
//! [`HostConfig`]: onchain_firewall::HostConfig

mod cmd;
mod scenario;

pub use cmd::*;
pub use scenario::*;
