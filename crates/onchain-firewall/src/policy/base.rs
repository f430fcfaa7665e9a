//! Executor and consumer gating shared by firewall-invoked policies.

use alloy_primitives::{map::HashSet, Address, B256};
use delegate::delegate;
use tracing::debug;

use crate::{
    constants::roles::POLICY_ADMIN_ROLE,
    AccessControl, AccessError, CallDescriptor, PolicyEnv, PolicyError,
};

/// Roles, authorized executors and approved consumers of a policy.
///
/// Only authorized executors may invoke the policy's hooks, and only for approved consumers. The
/// firewall the policy was deployed for is an executor from the start; a combining policy must be
/// added explicitly.
#[derive(Debug, Clone)]
pub struct PolicyBase {
    address: Address,
    access: AccessControl,
    executors: HashSet<Address>,
    consumers: HashSet<Address>,
}

impl PolicyBase {
    /// Creates the gating of a policy at `address` serving `firewall`. `admin` receives the default
    /// admin and policy admin roles.
    pub fn new(address: Address, firewall: Address, admin: Address) -> Self {
        let access = AccessControl::with_policy_admin(admin);
        let mut executors = HashSet::default();
        executors.insert(firewall);
        Self { address, access, executors, consumers: HashSet::default() }
    }

    /// Address of the policy.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Role table of the policy.
    pub const fn access(&self) -> &AccessControl {
        &self.access
    }

    delegate! {
        to self.access {
            /// Returns whether `account` holds `role`.
            pub fn has_role(&self, role: B256, account: Address) -> bool;
            /// Fails unless `account` holds `role`.
            pub fn check_role(&self, role: B256, account: Address) -> Result<(), AccessError>;
            /// Grants `role` to `account`; `caller` must hold the default admin role.
            pub fn grant_role(&mut self, caller: Address, role: B256, account: Address) -> Result<(), AccessError>;
            /// Revokes `role` from `account`; `caller` must hold the default admin role.
            pub fn revoke_role(&mut self, caller: Address, role: B256, account: Address) -> Result<(), AccessError>;
        }
    }

    /// Returns whether `executor` may invoke the policy.
    pub fn is_executor(&self, executor: Address) -> bool {
        self.executors.contains(&executor)
    }

    /// Returns whether the policy serves `consumer`.
    pub fn is_approved_consumer(&self, consumer: Address) -> bool {
        self.consumers.contains(&consumer)
    }

    /// Authorizes or deauthorizes an executor. Requires the policy admin role.
    pub fn set_executor_status(
        &mut self,
        caller: Address,
        executor: Address,
        status: bool,
    ) -> Result<(), PolicyError> {
        self.access.check_role(POLICY_ADMIN_ROLE, caller)?;
        if status {
            self.executors.insert(executor);
        } else {
            self.executors.remove(&executor);
        }
        debug!(policy = %self.address, %executor, status, "Executor status updated");
        Ok(())
    }

    /// Approves or unapproves consumers. Requires the policy admin role.
    pub fn set_consumers_statuses(
        &mut self,
        caller: Address,
        consumers: &[Address],
        statuses: &[bool],
    ) -> Result<(), PolicyError> {
        self.access.check_role(POLICY_ADMIN_ROLE, caller)?;
        if consumers.len() != statuses.len() {
            return Err(PolicyError::LengthMismatch);
        }
        for (consumer, status) in consumers.iter().zip(statuses) {
            if *status {
                self.consumers.insert(*consumer);
            } else {
                self.consumers.remove(consumer);
            }
        }
        debug!(policy = %self.address, ?consumers, ?statuses, "Consumer statuses updated");
        Ok(())
    }

    /// Fails unless the invoking address is an executor and the consumer is approved.
    pub fn ensure_authorized(&self, env: &PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        if !self.is_executor(env.caller) {
            return Err(PolicyError::UnauthorizedExecutor);
        }
        if !self.is_approved_consumer(call.consumer) {
            return Err(PolicyError::UnapprovedConsumer);
        }
        Ok(())
    }

    /// Fails unless `caller` holds `role`.
    pub(crate) fn only_role(&self, role: B256, caller: Address) -> Result<(), PolicyError> {
        Ok(self.access.check_role(role, caller)?)
    }
}
