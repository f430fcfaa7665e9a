//! Stateless-configuration guards: reentrancy and EOA-only callers.

use alloy_primitives::{map::HashMap, Address};

use crate::{CallDescriptor, Policy, PolicyEnv, PolicyError, TxScoped};

/// Rejects a protected call into a consumer whose previous protected call has not finished.
///
/// The guard is held by the outermost protected call into the consumer and released by that
/// call's post hook only, so rejected nested calls never release it.
#[derive(Debug, Clone)]
pub struct NonReentrantPolicy {
    address: Address,
    /// Depth of the call holding the guard, per consumer.
    holders: TxScoped<HashMap<Address, u32>>,
}

impl NonReentrantPolicy {
    /// Creates the policy at `address`.
    pub fn new(address: Address) -> Self {
        Self { address, holders: TxScoped::default() }
    }
}

impl Policy for NonReentrantPolicy {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &'static str {
        "NonReentrantPolicy"
    }

    fn pre_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        let holders = self.holders.get_mut(env.tx.id);
        if holders.contains_key(&call.consumer) {
            return Err(PolicyError::Reentrancy);
        }
        holders.insert(call.consumer, env.depth);
        Ok(())
    }

    fn post_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        let holders = self.holders.get_mut(env.tx.id);
        if holders.get(&call.consumer) == Some(&env.depth) {
            holders.remove(&call.consumer);
        }
        Ok(())
    }
}

/// Approves a call only if it comes straight from the transaction origin.
#[derive(Debug, Clone)]
pub struct OnlyEoaPolicy {
    address: Address,
}

impl OnlyEoaPolicy {
    /// Creates the policy at `address`.
    pub const fn new(address: Address) -> Self {
        Self { address }
    }
}

impl Policy for OnlyEoaPolicy {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &'static str {
        "OnlyEOAPolicy"
    }

    fn pre_execution(&mut self, _env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        if call.sender == call.origin {
            Ok(())
        } else {
            Err(PolicyError::NotEoa)
        }
    }

    fn post_execution(&mut self, _env: &mut PolicyEnv<'_>, _call: &CallDescriptor) -> Result<(), PolicyError> {
        Ok(())
    }
}
