//! Per-consumer forbidden selectors.

use alloy_primitives::{map::HashSet, Address, Selector};
use tracing::debug;

use crate::{
    constants::roles::POLICY_ADMIN_ROLE, AccessControl, CallDescriptor, Policy, PolicyEnv, PolicyError,
    TxScoped,
};

/// Rejects transactions that enter a forbidden method of a consumer.
///
/// Entering a forbidden method taints the transaction in the pre-execution hook; the
/// post-execution hook then rejects the forbidden call itself and every protected call nested in
/// it.
#[derive(Debug, Clone)]
pub struct ForbiddenMethodsPolicy {
    address: Address,
    access: AccessControl,
    forbidden: HashSet<(Address, Selector)>,
    tainted: TxScoped<bool>,
}

impl ForbiddenMethodsPolicy {
    /// Creates the policy at `address`; `admin` receives the default admin and policy admin roles.
    pub fn new(address: Address, admin: Address) -> Self {
        Self {
            address,
            access: AccessControl::with_policy_admin(admin),
            forbidden: HashSet::default(),
            tainted: TxScoped::default(),
        }
    }

    /// Role table of the policy.
    pub const fn access(&self) -> &AccessControl {
        &self.access
    }

    /// Mutable role table of the policy.
    pub fn access_mut(&mut self) -> &mut AccessControl {
        &mut self.access
    }

    /// Forbids or allows `selector` on `consumer`. Requires the policy admin role.
    pub fn set_consumer_forbidden_method(
        &mut self,
        caller: Address,
        consumer: Address,
        selector: Selector,
        status: bool,
    ) -> Result<(), PolicyError> {
        self.access.check_role(POLICY_ADMIN_ROLE, caller)?;
        if status {
            self.forbidden.insert((consumer, selector));
        } else {
            self.forbidden.remove(&(consumer, selector));
        }
        debug!(policy = %self.address, %consumer, %selector, status, "Forbidden method updated");
        Ok(())
    }

    /// Returns whether `selector` is forbidden on `consumer`.
    pub fn is_forbidden(&self, consumer: Address, selector: Selector) -> bool {
        self.forbidden.contains(&(consumer, selector))
    }
}

impl Policy for ForbiddenMethodsPolicy {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &'static str {
        "ForbiddenMethodsPolicy"
    }

    fn pre_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        if self.is_forbidden(call.consumer, call.selector()) {
            *self.tainted.get_mut(env.tx.id) = true;
        }
        Ok(())
    }

    fn post_execution(&mut self, env: &mut PolicyEnv<'_>, _call: &CallDescriptor) -> Result<(), PolicyError> {
        if self.tainted.get(env.tx.id).copied().unwrap_or_default() {
            Err(PolicyError::ForbiddenMethod)
        } else {
            Ok(())
        }
    }
}
