//! Bounds on how far a protected call may move the consumer's balances.

use alloy_primitives::{map::HashMap, Address, U256};
use tracing::{debug, trace};

use crate::{
    constants::{roles::POLICY_ADMIN_ROLE, NATIVE_TOKEN},
    CallDescriptor, Policy, PolicyBase, PolicyEnv, PolicyError, TxScoped,
};

/// Approves a call only if no tracked balance of the consumer changed by more than its limit
/// between the pre- and post-execution hooks.
///
/// Snapshots are stacked per consumer so nested protected calls are measured independently.
#[derive(Debug, Clone)]
pub struct BalanceChangePolicy {
    base: PolicyBase,
    max_change: HashMap<(Address, Address), U256>,
    tokens: HashMap<Address, Vec<Address>>,
    snapshots: TxScoped<HashMap<Address, Vec<Vec<(Address, U256)>>>>,
}

impl BalanceChangePolicy {
    /// Creates the policy at `address` for `firewall`, administered by `admin`.
    pub fn new(address: Address, firewall: Address, admin: Address) -> Self {
        Self {
            base: PolicyBase::new(address, firewall, admin),
            max_change: HashMap::default(),
            tokens: HashMap::default(),
            snapshots: TxScoped::default(),
        }
    }

    /// Tracks `token` for `consumer` with limit `max`, or updates the limit of a tracked token.
    /// Requires the policy admin role.
    pub fn set_consumer_max_balance_change(
        &mut self,
        caller: Address,
        consumer: Address,
        token: Address,
        max: U256,
    ) -> Result<(), PolicyError> {
        self.base.only_role(POLICY_ADMIN_ROLE, caller)?;
        let tokens = self.tokens.entry(consumer).or_default();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
        self.max_change.insert((consumer, token), max);
        debug!(policy = %self.base.address(), %consumer, %token, %max, "Balance change limit set");
        Ok(())
    }

    /// Stops tracking `token` for `consumer`. The last tracked token takes its place in the list.
    /// Requires the policy admin role.
    pub fn remove_token(&mut self, caller: Address, consumer: Address, token: Address) -> Result<(), PolicyError> {
        self.base.only_role(POLICY_ADMIN_ROLE, caller)?;
        if let Some(tokens) = self.tokens.get_mut(&consumer) {
            if let Some(index) = tokens.iter().position(|t| *t == token) {
                tokens.swap_remove(index);
            }
        }
        self.max_change.remove(&(consumer, token));
        debug!(policy = %self.base.address(), %consumer, %token, "Token no longer tracked");
        Ok(())
    }

    /// Tokens tracked for `consumer`, in list order.
    pub fn consumer_tokens(&self, consumer: Address) -> &[Address] {
        self.tokens.get(&consumer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Limit for `token` of `consumer`.
    pub fn consumer_max_balance_change(&self, consumer: Address, token: Address) -> U256 {
        self.max_change.get(&(consumer, token)).copied().unwrap_or_default()
    }
}

impl Policy for BalanceChangePolicy {
    fn address(&self) -> Address {
        self.base.address()
    }

    fn name(&self) -> &'static str {
        "BalanceChangePolicy"
    }

    fn pre_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        self.base.ensure_authorized(env, call)?;
        let mut snapshot = Vec::with_capacity(self.consumer_tokens(call.consumer).len());
        for token in self.consumer_tokens(call.consumer) {
            let mut balance = env.ledger.balance_of(*token, call.consumer)?;
            // The attached value was credited before the hook; measure against the balance without it.
            if *token == NATIVE_TOKEN {
                balance = balance.saturating_sub(call.value);
            }
            snapshot.push((*token, balance));
        }
        trace!(consumer = %call.consumer, ?snapshot, "Balance snapshot taken");
        self.snapshots.get_mut(env.tx.id).entry(call.consumer).or_default().push(snapshot);
        Ok(())
    }

    fn post_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        self.base.ensure_authorized(env, call)?;
        let snapshot = self
            .snapshots
            .get_mut(env.tx.id)
            .get_mut(&call.consumer)
            .and_then(Vec::pop)
            .ok_or(PolicyError::MissingSnapshot { policy: "BalanceChangePolicy" })?;
        for (token, pre) in snapshot {
            let post = env.ledger.balance_of(token, call.consumer)?;
            let change = if post > pre { post - pre } else { pre - post };
            let Some(max) = self.max_change.get(&(call.consumer, token)).copied() else {
                continue;
            };
            trace!(consumer = %call.consumer, %token, %pre, %post, %max, "Balance change measured");
            if change > max {
                return Err(PolicyError::LimitExceeded);
            }
        }
        Ok(())
    }

    fn base(&self) -> Option<&PolicyBase> {
        Some(&self.base)
    }

    fn base_mut(&mut self) -> Option<&mut PolicyBase> {
        Some(&mut self.base)
    }
}
