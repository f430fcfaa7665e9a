//! Approval of exact call sequences, issued by a trusted signer per transaction origin.

use alloy_primitives::{map::HashMap, Address, B256, U256};
use tracing::debug;

use crate::{
    constants::roles::SIGNER_ROLE, verify_bundle, ApprovalBundle, BlockEnv, CallDescriptor, Policy,
    PolicyBase, PolicyEnv, PolicyError,
};

/// Approves a call only if it is the next one of the call hashes a signer approved for the
/// transaction origin.
///
/// Approved hashes form a stack: the last approved hash must match the first protected call, and
/// each match pops it. The consumer is bound inside every call hash, so approvals are keyed by
/// origin alone.
#[derive(Debug, Clone)]
pub struct ApprovedCallsPolicy {
    base: PolicyBase,
    approved_calls: HashMap<Address, Vec<B256>>,
    expirations: HashMap<Address, U256>,
    nonces: HashMap<Address, U256>,
}

impl ApprovedCallsPolicy {
    /// Creates the policy at `address` for `firewall`, administered by `admin`.
    pub fn new(address: Address, firewall: Address, admin: Address) -> Self {
        Self {
            base: PolicyBase::new(address, firewall, admin),
            approved_calls: HashMap::default(),
            expirations: HashMap::default(),
            nonces: HashMap::default(),
        }
    }

    /// Replaces the approved call hashes of `origin`. Requires the signer role.
    pub fn approve_calls(
        &mut self,
        caller: Address,
        call_hashes: Vec<B256>,
        expiration: U256,
        origin: Address,
    ) -> Result<(), PolicyError> {
        self.base.only_role(SIGNER_ROLE, caller)?;
        self.store(call_hashes, expiration, origin);
        Ok(())
    }

    /// Replaces the approved call hashes of the bundle's origin, authorized by a signature of a
    /// signer-role holder. Anyone may submit the bundle.
    pub fn approve_calls_via_signature(
        &mut self,
        block: &BlockEnv,
        bundle: ApprovalBundle,
        signature: &[u8],
    ) -> Result<(), PolicyError> {
        if bundle.nonce != self.nonce(bundle.origin) {
            return Err(PolicyError::InvalidNonce);
        }
        let signer = verify_bundle(&bundle, signature, self.base.address(), block)?;
        if !self.base.has_role(SIGNER_ROLE, signer) {
            debug!(%signer, "Approval bundle signed by a non-signer");
            return Err(PolicyError::InvalidSignature);
        }
        *self.nonces.entry(bundle.origin).or_default() += U256::from(1);
        self.store(bundle.call_hashes, bundle.expiration, bundle.origin);
        Ok(())
    }

    /// Next nonce an approval bundle for `origin` must carry.
    pub fn nonce(&self, origin: Address) -> U256 {
        self.nonces.get(&origin).copied().unwrap_or_default()
    }

    /// Call hashes still approved for `origin`, the next to be consumed last.
    pub fn approved_calls(&self, origin: Address) -> &[B256] {
        self.approved_calls.get(&origin).map(Vec::as_slice).unwrap_or_default()
    }

    /// Expiration of `origin`'s current approval.
    pub fn expiration(&self, origin: Address) -> U256 {
        self.expirations.get(&origin).copied().unwrap_or_default()
    }

    fn store(&mut self, call_hashes: Vec<B256>, expiration: U256, origin: Address) {
        debug!(policy = %self.base.address(), %origin, count = call_hashes.len(), %expiration, "Calls approved");
        self.approved_calls.insert(origin, call_hashes);
        self.expirations.insert(origin, expiration);
    }
}

impl Policy for ApprovedCallsPolicy {
    fn address(&self) -> Address {
        self.base.address()
    }

    fn name(&self) -> &'static str {
        "ApprovedCallsPolicy"
    }

    fn pre_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError> {
        self.base.ensure_authorized(env, call)?;
        let calls = self.approved_calls.entry(call.origin).or_default();
        let Some(next) = calls.last() else {
            return Err(PolicyError::CallHashesEmpty);
        };
        let expiration = self.expirations.get(&call.origin).copied().unwrap_or_default();
        if U256::from(env.block.timestamp) > expiration {
            return Err(PolicyError::Expired);
        }
        if *next != call.call_hash() {
            return Err(PolicyError::InvalidCallHash);
        }
        calls.pop();
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
