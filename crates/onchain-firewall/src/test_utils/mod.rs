//! Test utilities for the firewall engine.

use alloy_primitives::{address, Address, U256};

use crate::{BlockEnv, FirewallHost, MemoryLedger};

mod sample;
mod signer;

pub use sample::*;
pub use signer::*;

/// Chain id tests run on.
pub const CHAIN_ID: u64 = 31337;
/// Timestamp of the genesis block of [`new_host`].
pub const GENESIS_TIMESTAMP: u64 = 1_700_000_000;

/// Owner of [`FIREWALL`].
pub const OWNER: Address = address!("00000000000000000000000000000000000000f0");
/// Firewall admin of [`CONSUMER`] and admin of test policies.
pub const ADMIN: Address = address!("00000000000000000000000000000000000000ad");
/// The firewall.
pub const FIREWALL: Address = address!("00000000000000000000000000000000000000f1");
/// The protected sample consumer.
pub const CONSUMER: Address = address!("00000000000000000000000000000000000000c1");
/// A funded externally owned account.
pub const USER: Address = address!("0000000000000000000000000000000000000a01");
/// Another funded externally owned account.
pub const OTHER: Address = address!("0000000000000000000000000000000000000a02");
/// A contract calling the consumer on behalf of its origin.
pub const CONTRACT_USER: Address = address!("0000000000000000000000000000000000000cc1");
/// A fungible token.
pub const TOKEN: Address = address!("0000000000000000000000000000000000007070");

/// `n` ether in wei.
pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10).pow(U256::from(18))
}

/// `n` micro-ether in wei.
pub fn micro_ether(n: u64) -> U256 {
    U256::from(n) * U256::from(10).pow(U256::from(12))
}

/// Creates a host with [`FIREWALL`] deployed, [`CONSUMER`] registered behind it and [`USER`] and
/// [`OTHER`] funded with 1000 ether and 1000 [`TOKEN`].
pub fn new_host() -> FirewallHost<MemoryLedger> {
    let ledger = [USER, OTHER].into_iter().fold(MemoryLedger::default(), |ledger, account| {
        ledger.with_account_balance(account, ether(1000)).with_token_balance(TOKEN, account, ether(1000))
    });
    let mut host = FirewallHost::new(ledger, BlockEnv::new(CHAIN_ID).with_timestamp(GENESIS_TIMESTAMP));
    host.deploy_firewall(FIREWALL, OWNER).unwrap();
    host.register_consumer(CONSUMER, FIREWALL, ADMIN).unwrap();
    host
}
