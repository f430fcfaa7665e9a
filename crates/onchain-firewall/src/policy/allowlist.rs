//! Per-consumer allowlist of senders.

use alloy_primitives::{map::HashSet, Address};
use tracing::debug;

use crate::{
    constants::roles::POLICY_ADMIN_ROLE, AccessControl, CallDescriptor, Policy, PolicyEnv, PolicyError,
};

/// Approves a call only if its sender is allowlisted for the consumer.
#[derive(Debug, Clone)]
pub struct AllowlistPolicy {
    address: Address,
    access: AccessControl,
    allowed: HashSet<(Address, Address)>,
}

impl AllowlistPolicy {
    /// Creates the policy at `address`; `admin` receives the default admin and policy admin roles.
    pub fn new(address: Address, admin: Address) -> Self {
        Self { address, access: AccessControl::with_policy_admin(admin), allowed: HashSet::default() }
    }

    /// Role table of the policy.
    pub const fn access(&self) -> &AccessControl {
        &self.access
    }

    /// Mutable role table of the policy.
    pub fn access_mut(&mut self) -> &mut AccessControl {
        &mut self.access
    }

    /// Adds or removes `accounts` from the allowlist of `consumer`. Requires the policy admin role.
    pub fn set_consumer_allowlist(
        &mut self,
        caller: Address,
        consumer: Address,
        accounts: &[Address],
        status: bool,
    ) -> Result<(), PolicyError> {
        self.access.check_role(POLICY_ADMIN_ROLE, caller)?;
        for account in accounts {
            if status {
                self.allowed.insert((consumer, *account));
            } else {
                self.allowed.remove(&(consumer, *account));
            }
        }
        debug!(policy = %self.address, %consumer, ?accounts, status, "Allowlist updated");
        Ok(())
    }

    /// Returns whether `account` may call `consumer`.
    pub fn is_allowed(&self, consumer: Address, account: Address) -> bool {
        self.allowed.contains(&(consumer, account))
    }
}

impl Policy for AllowlistPolicy {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &'static str {
        "AllowlistPolicy"
    }

    fn pre_execution(&mut self, _env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        if self.is_allowed(call.consumer, call.sender) {
            Ok(())
        } else {
            Err(PolicyError::SenderNotAllowed)
        }
    }

    fn post_execution(&mut self, _env: &mut PolicyEnv<'_>, _call: &CallDescriptor) -> Result<(), PolicyError> {
        Ok(())
    }
}
