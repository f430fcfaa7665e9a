//! One-off approval of individual admin calls.

use alloy_primitives::{map::HashMap, Address, B256};
use tracing::debug;

use crate::{
    constants::{roles::APPROVER_ROLE, DEFAULT_ADMIN_CALL_EXPIRATION},
    BlockEnv, CallDescriptor, Policy, PolicyBase, PolicyEnv, PolicyError,
};

/// Approves a call only if an approver approved its exact call hash recently enough. Each
/// approval is good for a single call.
#[derive(Debug, Clone)]
pub struct AdminCallPolicy {
    base: PolicyBase,
    approved_at: HashMap<B256, u64>,
    expiration_time: u64,
}

impl AdminCallPolicy {
    /// Creates the policy at `address` for `firewall`, administered by `admin`.
    pub fn new(address: Address, firewall: Address, admin: Address) -> Self {
        Self {
            base: PolicyBase::new(address, firewall, admin),
            approved_at: HashMap::default(),
            expiration_time: DEFAULT_ADMIN_CALL_EXPIRATION,
        }
    }

    /// Approves `call_hash` as of the current block. Requires the approver role.
    pub fn approve_call(&mut self, caller: Address, block: &BlockEnv, call_hash: B256) -> Result<(), PolicyError> {
        self.base.only_role(APPROVER_ROLE, caller)?;
        self.approved_at.insert(call_hash, block.timestamp);
        debug!(policy = %self.base.address(), %call_hash, "Admin call approved");
        Ok(())
    }

    /// Sets how many seconds an approval stays usable. Requires the approver role.
    pub fn set_expiration_time(&mut self, caller: Address, expiration_time: u64) -> Result<(), PolicyError> {
        self.base.only_role(APPROVER_ROLE, caller)?;
        self.expiration_time = expiration_time;
        Ok(())
    }

    /// Seconds an approval stays usable.
    pub const fn expiration_time(&self) -> u64 {
        self.expiration_time
    }

    /// Timestamp `call_hash` was approved at, if it is pending.
    pub fn approved_at(&self, call_hash: B256) -> Option<u64> {
        self.approved_at.get(&call_hash).copied()
    }
}

impl Policy for AdminCallPolicy {
    fn address(&self) -> Address {
        self.base.address()
    }

    fn name(&self) -> &'static str {
        "AdminCallPolicy"
    }

    fn pre_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        self.base.ensure_authorized(env, call)?;
        let call_hash = call.call_hash();
        match self.approved_at.get(&call_hash) {
            Some(at) if env.block.timestamp <= at.saturating_add(self.expiration_time) => {
                self.approved_at.remove(&call_hash);
                Ok(())
            }
            _ => Err(PolicyError::NotApproved),
        }
    }

    fn post_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        self.base.ensure_authorized(env, call)
    }

    fn base(&self) -> Option<&PolicyBase> {
        Some(&self.base)
    }

    fn base_mut(&mut self) -> Option<&mut PolicyBase> {
        Some(&mut self.base)
    }
}
