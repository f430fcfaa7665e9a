//! Approval of the selector sequences a transaction may walk through.

use alloy_primitives::{
    map::{HashMap, HashSet},
    Address, Selector, B256,
};
use tracing::{debug, trace};

use crate::{
    constants::roles::POLICY_ADMIN_ROLE, next_vector_hash, prefix_vector_hashes, CallDescriptor, Policy,
    PolicyBase, PolicyEnv, PolicyError, TxScoped, VECTOR_SEED,
};

/// Approves a call only if the selectors called on the consumer so far in the transaction,
/// including this one, hash to an approved vector.
#[derive(Debug, Clone)]
pub struct ApprovedVectorsPolicy {
    base: PolicyBase,
    approved: HashSet<B256>,
    current: TxScoped<HashMap<Address, B256>>,
}

impl ApprovedVectorsPolicy {
    /// Creates the policy at `address` for `firewall`, administered by `admin`.
    pub fn new(address: Address, firewall: Address, admin: Address) -> Self {
        Self {
            base: PolicyBase::new(address, firewall, admin),
            approved: HashSet::default(),
            current: TxScoped::default(),
        }
    }

    /// Approves or revokes a single vector hash. Requires the policy admin role.
    pub fn set_vector_hash_status(&mut self, caller: Address, vector_hash: B256, status: bool) -> Result<(), PolicyError> {
        self.base.only_role(POLICY_ADMIN_ROLE, caller)?;
        if status {
            self.approved.insert(vector_hash);
        } else {
            self.approved.remove(&vector_hash);
        }
        debug!(policy = %self.base.address(), %vector_hash, status, "Vector hash status updated");
        Ok(())
    }

    /// Approves every prefix of a selector sequence.
    pub fn approve_sequence(&mut self, caller: Address, sequence: &[Selector]) -> Result<(), PolicyError> {
        self.base.only_role(POLICY_ADMIN_ROLE, caller)?;
        self.approved.extend(prefix_vector_hashes(sequence));
        Ok(())
    }

    /// Returns whether `vector_hash` is approved.
    pub fn is_approved(&self, vector_hash: B256) -> bool {
        self.approved.contains(&vector_hash)
    }
}

impl Policy for ApprovedVectorsPolicy {
    fn address(&self) -> Address {
        self.base.address()
    }

    fn name(&self) -> &'static str {
        "ApprovedVectorsPolicy"
    }

    fn pre_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        self.base.ensure_authorized(env, call)?;
        let current = self.current.get_mut(env.tx.id).entry(call.consumer).or_insert(VECTOR_SEED);
        let next = next_vector_hash(*current, call.selector());
        trace!(consumer = %call.consumer, selector = %call.selector(), vector_hash = %next, "Advancing vector");
        if !self.approved.contains(&next) {
            return Err(PolicyError::UnapprovedVector);
        }
        *current = next;
        Ok(())
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
