//! Deployed policy instances and their invocation.

use core::fmt;

use alloy_primitives::{map::HashMap, Address, B256};
use tracing::trace;

use crate::{
    policy::Hook, BlockEnv, CallDescriptor, FirewallError, InvariantPolicy, Ledger, Policy, PolicyBase,
    PolicyEnv, PolicyError, PolicyExecutor, TxEnv,
};

/// A policy instance living at an address.
#[derive(Debug, Clone)]
pub enum DeployedPolicy {
    /// A pre/post call policy.
    Call(Box<dyn Policy>),
    /// A private invariant policy.
    Invariant(Box<dyn InvariantPolicy>),
}

/// Every deployed policy, keyed by address.
#[derive(Debug, Clone, Default)]
pub struct PolicyRegistry {
    policies: HashMap<Address, DeployedPolicy>,
}

impl PolicyRegistry {
    /// Deploys a call policy at its own address.
    pub fn deploy<P: Policy + 'static>(&mut self, policy: P) -> Result<Address, FirewallError> {
        let address = policy.address();
        self.insert_new(address, DeployedPolicy::Call(Box::new(policy)))?;
        Ok(address)
    }

    /// Deploys an invariant policy at its own address.
    pub fn deploy_invariant<P: InvariantPolicy + 'static>(&mut self, policy: P) -> Result<Address, FirewallError> {
        let address = policy.address();
        self.insert_new(address, DeployedPolicy::Invariant(Box::new(policy)))?;
        Ok(address)
    }

    fn insert_new(&mut self, address: Address, policy: DeployedPolicy) -> Result<(), FirewallError> {
        if self.policies.contains_key(&address) {
            return Err(FirewallError::PolicyExists(address));
        }
        self.policies.insert(address, policy);
        Ok(())
    }

    /// Returns whether a policy is deployed at `address`.
    pub fn contains(&self, address: Address) -> bool {
        self.policies.contains_key(&address)
    }

    /// The policy at `address`, if it is a call policy of type `P`.
    pub fn get<P: Policy + 'static>(&self, address: Address) -> Option<&P> {
        match self.policies.get(&address)? {
            DeployedPolicy::Call(policy) => (**policy).as_any().downcast_ref(),
            DeployedPolicy::Invariant(_) => None,
        }
    }

    /// Mutable access to the policy at `address`, if it is a call policy of type `P`.
    pub fn get_mut<P: Policy + 'static>(&mut self, address: Address) -> Option<&mut P> {
        match self.policies.get_mut(&address)? {
            DeployedPolicy::Call(policy) => (**policy).as_any_mut().downcast_mut(),
            DeployedPolicy::Invariant(_) => None,
        }
    }

    /// The invariant policy at `address`, if it has type `P`.
    pub fn get_invariant<P: InvariantPolicy + 'static>(&self, address: Address) -> Option<&P> {
        match self.policies.get(&address)? {
            DeployedPolicy::Invariant(policy) => (**policy).as_any().downcast_ref(),
            DeployedPolicy::Call(_) => None,
        }
    }

    /// Mutable access to the invariant policy at `address`, if it has type `P`.
    pub fn get_invariant_mut<P: InvariantPolicy + 'static>(&mut self, address: Address) -> Option<&mut P> {
        match self.policies.get_mut(&address)? {
            DeployedPolicy::Invariant(policy) => (**policy).as_any_mut().downcast_mut(),
            DeployedPolicy::Call(_) => None,
        }
    }

    /// Executor and consumer gating of the call policy at `address`, if it has any.
    pub fn base_mut(&mut self, address: Address) -> Option<&mut PolicyBase> {
        match self.policies.get_mut(&address)? {
            DeployedPolicy::Call(policy) => policy.base_mut(),
            DeployedPolicy::Invariant(_) => None,
        }
    }

    /// Creates an invoker running policies against `ledger` in the given environment, for a
    /// protected call nested `depth` calls deep.
    pub fn invoker<'a>(
        &'a mut self,
        ledger: &'a dyn Ledger,
        block: BlockEnv,
        tx: TxEnv,
        depth: u32,
    ) -> PolicyInvoker<'a> {
        PolicyInvoker { registry: self, ledger, block, tx, depth }
    }
}

/// Runs policy hooks with try/catch semantics.
///
/// A policy is taken out of the registry while its hook runs, so it cannot invoke itself. When a
/// hook fails, the policy's state is restored to what it was before the hook.
pub struct PolicyInvoker<'a> {
    registry: &'a mut PolicyRegistry,
    ledger: &'a dyn Ledger,
    block: BlockEnv,
    tx: TxEnv,
    depth: u32,
}

impl fmt::Debug for PolicyInvoker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyInvoker")
            .field("registry", &self.registry)
            .field("block", &self.block)
            .field("tx", &self.tx)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl PolicyInvoker<'_> {
    /// Runs the pre-execution hook of the invariant policy at `policy`, returning the slots to
    /// snapshot.
    pub fn invariant_pre_execution(
        &mut self,
        policy: Address,
        caller: Address,
        call: &CallDescriptor,
    ) -> Result<Vec<B256>, PolicyError> {
        self.invoke_invariant(policy, caller, |policy, env| policy.pre_execution(env, call))
    }

    /// Runs the post-execution hook of the invariant policy at `policy`.
    pub fn invariant_post_execution(
        &mut self,
        policy: Address,
        caller: Address,
        call: &CallDescriptor,
        pre_values: &[B256],
        post_values: &[B256],
    ) -> Result<(), PolicyError> {
        self.invoke_invariant(policy, caller, |policy, env| {
            policy.post_execution(env, call, pre_values, post_values)
        })
    }

    fn invoke(&mut self, address: Address, caller: Address, call: &CallDescriptor, hook: Hook) -> Result<(), PolicyError> {
        let mut policy = match self.registry.policies.remove(&address) {
            Some(DeployedPolicy::Call(policy)) => policy,
            Some(other) => {
                self.registry.policies.insert(address, other);
                return Err(PolicyError::WrongKind(address));
            }
            None => return Err(PolicyError::NotDeployed(address)),
        };
        let backup = policy.clone();

        let (ledger, block, tx, depth) = (self.ledger, self.block, self.tx, self.depth);
        let result = {
            let mut env = PolicyEnv { policy: address, caller, block, tx, depth, ledger, executor: self };
            match hook {
                Hook::Pre => policy.pre_execution(&mut env, call),
                Hook::Post => policy.post_execution(&mut env, call),
            }
        };
        trace!(policy = %address, name = policy.name(), %hook, %caller, ok = result.is_ok(), "Policy invoked");

        let policy = if result.is_ok() { policy } else { backup };
        self.registry.policies.insert(address, DeployedPolicy::Call(policy));
        result
    }

    fn invoke_invariant<T>(
        &mut self,
        address: Address,
        caller: Address,
        f: impl FnOnce(&mut dyn InvariantPolicy, &mut PolicyEnv<'_>) -> Result<T, PolicyError>,
    ) -> Result<T, PolicyError> {
        let mut policy = match self.registry.policies.remove(&address) {
            Some(DeployedPolicy::Invariant(policy)) => policy,
            Some(other) => {
                self.registry.policies.insert(address, other);
                return Err(PolicyError::WrongKind(address));
            }
            None => return Err(PolicyError::NotDeployed(address)),
        };
        let backup = policy.clone();

        let (ledger, block, tx, depth) = (self.ledger, self.block, self.tx, self.depth);
        let result = {
            let mut env = PolicyEnv { policy: address, caller, block, tx, depth, ledger, executor: self };
            f(policy.as_mut(), &mut env)
        };
        trace!(policy = %address, name = policy.name(), %caller, ok = result.is_ok(), "Invariant policy invoked");

        let policy = if result.is_ok() { policy } else { backup };
        self.registry.policies.insert(address, DeployedPolicy::Invariant(policy));
        result
    }
}

impl PolicyExecutor for PolicyInvoker<'_> {
    fn pre_execution(&mut self, policy: Address, caller: Address, call: &CallDescriptor) -> Result<(), PolicyError> {
        self.invoke(policy, caller, call, Hook::Pre)
    }

    fn post_execution(&mut self, policy: Address, caller: Address, call: &CallDescriptor) -> Result<(), PolicyError> {
        self.invoke(policy, caller, call, Hook::Post)
    }
}
