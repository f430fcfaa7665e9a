//! Policy capability traits and the built-in policies.
//!
//! A [`Policy`] approves or rejects a protected call twice: before the guarded logic runs and
//! after it returned. An [`InvariantPolicy`] instead names storage slots to snapshot before the
//! call and judges the before/after values.

use core::{any::Any, fmt};

use alloy_primitives::{Address, B256};
use serde::Serialize;

use crate::{BlockEnv, CallDescriptor, Ledger, PolicyError, TxEnv};

mod base;
pub use base::*;

mod admin_call;
pub use admin_call::*;

mod allowlist;
pub use allowlist::*;

mod approved_calls;
pub use approved_calls::*;

mod approved_vectors;
pub use approved_vectors::*;

mod balance_change;
pub use balance_change::*;

mod combined;
pub use combined::*;

mod forbidden_methods;
pub use forbidden_methods::*;

mod guards;
pub use guards::*;

mod private_invariants;
pub use private_invariants::*;

/// The two evaluation points around a protected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Hook {
    /// Before the guarded logic.
    #[display("pre")]
    Pre,
    /// After the guarded logic.
    #[display("post")]
    Post,
}

/// Invokes deployed policies on behalf of another policy.
pub trait PolicyExecutor {
    /// Runs `policy`'s pre-execution hook with `caller` as the invoking address.
    fn pre_execution(&mut self, policy: Address, caller: Address, call: &CallDescriptor)
        -> Result<(), PolicyError>;

    /// Runs `policy`'s post-execution hook with `caller` as the invoking address.
    fn post_execution(
        &mut self,
        policy: Address,
        caller: Address,
        call: &CallDescriptor,
    ) -> Result<(), PolicyError>;
}

/// Everything a policy hook may observe besides the call itself.
pub struct PolicyEnv<'a> {
    /// Address of the policy being invoked.
    pub policy: Address,
    /// Address invoking the policy: the firewall or an executor policy.
    pub caller: Address,
    /// Current block.
    pub block: BlockEnv,
    /// Current transaction.
    pub tx: TxEnv,
    /// Number of protected calls the judged call is nested in; `0` for an outermost call.
    pub depth: u32,
    /// Read-only ledger view.
    pub ledger: &'a dyn Ledger,
    /// Invokes other policies, with this policy as their caller.
    pub executor: &'a mut dyn PolicyExecutor,
}

impl fmt::Debug for PolicyEnv<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyEnv")
            .field("policy", &self.policy)
            .field("caller", &self.caller)
            .field("block", &self.block)
            .field("tx", &self.tx)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

/// A policy judging protected calls.
pub trait Policy: PolicyObject + fmt::Debug + Send + Sync {
    /// Address the policy is deployed at.
    fn address(&self) -> Address;

    /// Human readable kind, used in logs.
    fn name(&self) -> &'static str;

    /// Judges the call before the guarded logic runs.
    fn pre_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError>;

    /// Judges the call after the guarded logic returned.
    fn post_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<(), PolicyError>;

    /// Shared executor/consumer gating, for policies that have it.
    fn base(&self) -> Option<&PolicyBase> {
        None
    }

    /// Mutable access to the shared gating.
    fn base_mut(&mut self) -> Option<&mut PolicyBase> {
        None
    }
}

/// A policy checking private storage invariants of a consumer.
pub trait InvariantPolicy: InvariantPolicyObject + fmt::Debug + Send + Sync {
    /// Address the policy is deployed at.
    fn address(&self) -> Address;

    /// Human readable kind, used in logs.
    fn name(&self) -> &'static str;

    /// Returns the consumer storage slots to snapshot around the call.
    fn pre_execution(&mut self, env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<Vec<B256>, PolicyError>;

    /// Judges the slot values read before and after the guarded logic.
    fn post_execution(
        &mut self,
        env: &mut PolicyEnv<'_>,
        call: &CallDescriptor,
        pre_values: &[B256],
        post_values: &[B256],
    ) -> Result<(), PolicyError>;
}

/// Object-safe cloning and downcasting for [`Policy`] trait objects.
pub trait PolicyObject {
    /// Clones the policy into a new box.
    fn clone_box(&self) -> Box<dyn Policy>;
    /// Upcasts for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
    /// Mutable variant of [`Self::as_any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Policy + Clone + 'static> PolicyObject for T {
    fn clone_box(&self) -> Box<dyn Policy> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Clone for Box<dyn Policy> {
    fn clone(&self) -> Self {
        (**self).clone_box()
    }
}

/// Object-safe cloning and downcasting for [`InvariantPolicy`] trait objects.
pub trait InvariantPolicyObject {
    /// Clones the policy into a new box.
    fn clone_box(&self) -> Box<dyn InvariantPolicy>;
    /// Upcasts for downcasting to the concrete type.
    fn as_any(&self) -> &dyn Any;
    /// Mutable variant of [`Self::as_any`].
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: InvariantPolicy + Clone + 'static> InvariantPolicyObject for T {
    fn clone_box(&self) -> Box<dyn InvariantPolicy> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl Clone for Box<dyn InvariantPolicy> {
    fn clone(&self) -> Self {
        (**self).clone_box()
    }
}

/// Outcome of a single policy evaluation, as reported in telemetry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Whether the policy approved.
    pub approved: bool,
    /// Rejection reason.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Verdict {
    /// An approval.
    pub const fn approved() -> Self {
        Self { approved: true, reason: None }
    }

    /// A rejection with `reason`.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self { approved: false, reason: Some(reason.into()) }
    }
}

impl<T> From<&Result<T, PolicyError>> for Verdict {
    fn from(result: &Result<T, PolicyError>) -> Self {
        match result {
            Ok(_) => Self::approved(),
            Err(err) => Self::rejected(err.to_string()),
        }
    }
}
