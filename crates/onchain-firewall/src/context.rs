//! Block and transaction environment seen by policies.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Block-level environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEnv {
    /// Block number.
    pub number: u64,
    /// Block timestamp in seconds.
    pub timestamp: u64,
    /// Chain id approval bundles must be bound to.
    pub chain_id: u64,
}

impl BlockEnv {
    /// Creates a block environment at genesis of `chain_id`.
    pub const fn new(chain_id: u64) -> Self {
        Self { number: 0, timestamp: 0, chain_id }
    }

    /// Sets the timestamp.
    pub const fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Environment of the currently executing top-level transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEnv {
    /// Monotonic transaction id, unique per host.
    pub id: u64,
    /// Externally owned account that signed the transaction.
    pub origin: Address,
}

/// A value scoped to one top-level transaction.
///
/// The first access from a transaction that differs from the last one resets the value to its
/// default, so state never leaks between transactions.
#[derive(Debug, Clone, Default)]
pub struct TxScoped<T> {
    tx: Option<u64>,
    value: T,
}

impl<T: Default> TxScoped<T> {
    /// Mutable access for transaction `tx`, resetting stale state first.
    pub fn get_mut(&mut self, tx: u64) -> &mut T {
        if self.tx != Some(tx) {
            self.tx = Some(tx);
            self.value = T::default();
        }
        &mut self.value
    }

    /// Read access; `None` if nothing was recorded during transaction `tx`.
    pub fn get(&self, tx: u64) -> Option<&T> {
        (self.tx == Some(tx)).then_some(&self.value)
    }
}
