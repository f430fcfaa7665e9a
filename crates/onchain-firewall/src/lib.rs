//! Policy evaluation engine for firewall-protected contract calls.
//!
//! A [`Firewall`] consults the policies a consumer attached to it before and after every protected
//! call. Policies are independently deployed modules living in a [`PolicyRegistry`]; the
//! [`FirewallHost`] ties them to a [`Ledger`] and runs transactions atomically.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod access;
pub use access::*;

mod call;
pub use call::*;

mod config;
pub use config::*;

mod consumer;
pub use consumer::*;

mod context;
pub use context::*;

mod error;
pub use error::*;

mod events;
pub use events::*;

mod firewall;
pub use firewall::*;

mod host;
pub use host::*;

mod ledger;
pub use ledger::*;

mod memory;
pub use memory::*;

pub mod policy;
pub use policy::{InvariantPolicy, Policy, PolicyBase, PolicyEnv, PolicyExecutor, Verdict};

mod registry;
pub use registry::*;

mod signature;
pub use signature::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod vector;
pub use vector::*;
