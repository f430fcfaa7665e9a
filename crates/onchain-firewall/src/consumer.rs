//! Consumer-side firewall configuration.

use alloy_primitives::{
    map::{HashMap, HashSet},
    Address, Bytes,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AccessError, ApprovalBundle, ConsumerDirectory, FirewallError};

/// Firewall settings stored by a protected contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerState {
    firewall: Address,
    admin: Address,
    pending_admin: Option<Address>,
    approved_venn_policies: HashSet<Address>,
}

impl ConsumerState {
    /// Firewall protecting the consumer; zero leaves it unprotected.
    pub const fn firewall(&self) -> Address {
        self.firewall
    }

    /// Firewall admin of the consumer.
    pub const fn admin(&self) -> Address {
        self.admin
    }

    /// Admin nominated by [`Consumers::set_firewall_admin`] and not yet accepted.
    pub const fn pending_admin(&self) -> Option<Address> {
        self.pending_admin
    }

    /// Returns whether `policy` may be driven through a safe function call.
    pub fn is_approved_venn_policy(&self, policy: Address) -> bool {
        self.approved_venn_policies.contains(&policy)
    }
}

/// Every registered consumer.
#[derive(Debug, Clone, Default)]
pub struct Consumers {
    inner: HashMap<Address, ConsumerState>,
}

impl Consumers {
    /// Registers `consumer` behind `firewall` with firewall admin `admin`.
    pub fn register(&mut self, consumer: Address, firewall: Address, admin: Address) -> Result<(), FirewallError> {
        if self.inner.contains_key(&consumer) {
            return Err(FirewallError::ConsumerExists(consumer));
        }
        self.inner.insert(
            consumer,
            ConsumerState { firewall, admin, pending_admin: None, approved_venn_policies: HashSet::default() },
        );
        info!(%consumer, %firewall, %admin, "Consumer registered");
        Ok(())
    }

    /// State of `consumer`.
    pub fn get(&self, consumer: Address) -> Option<&ConsumerState> {
        self.inner.get(&consumer)
    }

    /// Moves `consumer` behind another firewall. Firewall admin only.
    pub fn set_firewall(&mut self, caller: Address, consumer: Address, firewall: Address) -> Result<(), FirewallError> {
        let state = self.admin_state(caller, consumer)?;
        state.firewall = firewall;
        info!(%consumer, %firewall, "Consumer firewall updated");
        Ok(())
    }

    /// Nominates a new firewall admin, who must accept. Firewall admin only.
    pub fn set_firewall_admin(&mut self, caller: Address, consumer: Address, new_admin: Address) -> Result<(), FirewallError> {
        let state = self.admin_state(caller, consumer)?;
        state.pending_admin = Some(new_admin);
        Ok(())
    }

    /// Accepts a firewall admin nomination. Nominee only.
    pub fn accept_firewall_admin(&mut self, caller: Address, consumer: Address) -> Result<(), FirewallError> {
        let state = self.inner.get_mut(&consumer).ok_or(FirewallError::UnknownConsumer(consumer))?;
        if state.pending_admin != Some(caller) {
            return Err(AccessError::NotPendingFirewallAdmin.into());
        }
        state.admin = caller;
        state.pending_admin = None;
        info!(%consumer, admin = %caller, "Firewall admin accepted");
        Ok(())
    }

    /// Approves or disapproves a policy for safe function calls. Firewall admin only.
    pub fn set_approved_venn_policy(
        &mut self,
        caller: Address,
        consumer: Address,
        policy: Address,
        status: bool,
    ) -> Result<(), FirewallError> {
        let state = self.admin_state(caller, consumer)?;
        if status {
            state.approved_venn_policies.insert(policy);
        } else {
            state.approved_venn_policies.remove(&policy);
        }
        info!(%consumer, %policy, status, "Venn policy status updated");
        Ok(())
    }

    fn admin_state(&mut self, caller: Address, consumer: Address) -> Result<&mut ConsumerState, FirewallError> {
        let state = self.inner.get_mut(&consumer).ok_or(FirewallError::UnknownConsumer(consumer))?;
        if state.admin != caller {
            return Err(AccessError::NotFirewallAdmin.into());
        }
        Ok(state)
    }
}

impl ConsumerDirectory for Consumers {
    fn firewall_admin(&self, consumer: Address) -> Option<Address> {
        self.inner.get(&consumer).map(ConsumerState::admin)
    }
}

/// Payload delivered to a policy before a safe function call executes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum VennPayload {
    /// Approve calls on an approved-calls policy with a signed bundle.
    ApproveCallsViaSignature {
        /// The signed bundle.
        bundle: ApprovalBundle,
        /// Signature over the bundle.
        signature: Bytes,
    },
}
