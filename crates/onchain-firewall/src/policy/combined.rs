//! Boolean composition of other policies through an explicit truth table.

use alloy_primitives::{map::HashSet, Address};
use tracing::{debug, trace};

use crate::{
    constants::roles::POLICY_ADMIN_ROLE, CallDescriptor, Policy, PolicyBase, PolicyEnv, PolicyError, TxScoped,
};

/// Runs its member policies as an executor and approves a call only if the tuple of member
/// verdicts is one of the allowed combinations.
///
/// Member failures are recorded, never propagated. A member's pre and post verdicts are ANDed, so
/// a row entry is `true` only if the member approved both hooks.
#[derive(Debug, Clone)]
pub struct CombinedPoliciesPolicy {
    base: PolicyBase,
    policies: Vec<Address>,
    allowed: HashSet<Vec<bool>>,
    results: TxScoped<Vec<Vec<bool>>>,
}

impl CombinedPoliciesPolicy {
    /// Creates the policy at `address` for `firewall`, administered by `admin`.
    pub fn new(address: Address, firewall: Address, admin: Address) -> Self {
        Self {
            base: PolicyBase::new(address, firewall, admin),
            policies: Vec::new(),
            allowed: HashSet::default(),
            results: TxScoped::default(),
        }
    }

    /// Replaces the member list and its allowed verdict rows. Requires the policy admin role.
    ///
    /// The members must authorize this policy as an executor and approve the consumers it serves.
    pub fn set_allowed_combinations(
        &mut self,
        caller: Address,
        policies: Vec<Address>,
        allowed: Vec<Vec<bool>>,
    ) -> Result<(), PolicyError> {
        self.base.only_role(POLICY_ADMIN_ROLE, caller)?;
        if policies.contains(&self.base.address()) {
            return Err(PolicyError::InvalidCombination("policy cannot combine itself"));
        }
        if allowed.iter().any(|row| row.len() != policies.len()) {
            return Err(PolicyError::InvalidCombination("combination length mismatch"));
        }
        debug!(policy = %self.base.address(), ?policies, rows = allowed.len(), "Allowed combinations set");
        self.policies = policies;
        self.allowed = allowed.into_iter().collect();
        Ok(())
    }

    /// Member policies, in evaluation order.
    pub fn policies(&self) -> &[Address] {
        &self.policies
    }

    /// Returns whether the verdict row is allowed.
    pub fn is_allowed_combination(&self, row: &[bool]) -> bool {
        self.allowed.contains(row)
    }
}

impl Policy for CombinedPoliciesPolicy {
    fn address(&self) -> Address {
        self.base.address()
    }

    fn name(&self) -> &'static str {
        "CombinedPoliciesPolicy"
    }

    fn pre_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        self.base.ensure_authorized(env, call)?;
        let row = self
            .policies
            .iter()
            .map(|policy| env.executor.pre_execution(*policy, env.policy, call).is_ok())
            .collect::<Vec<_>>();
        trace!(consumer = %call.consumer, ?row, "Combined pre-execution verdicts");
        self.results.get_mut(env.tx.id).push(row);
        Ok(())
    }

    fn post_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        self.base.ensure_authorized(env, call)?;
        let mut row = self
            .results
            .get_mut(env.tx.id)
            .pop()
            .ok_or(PolicyError::MissingSnapshot { policy: "CombinedPoliciesPolicy" })?;
        for (verdict, policy) in row.iter_mut().zip(&self.policies) {
            let approved = env.executor.post_execution(*policy, env.policy, call).is_ok();
            *verdict &= approved;
        }
        trace!(consumer = %call.consumer, ?row, "Combined verdicts");
        if self.allowed.contains(&row) {
            Ok(())
        } else {
            Err(PolicyError::DisallowedCombination)
        }
    }

    fn base(&self) -> Option<&PolicyBase> {
        Some(&self.base)
    }

    fn base_mut(&mut self) -> Option<&mut PolicyBase> {
        Some(&mut self.base)
    }
}
