//! The firewall dispatcher: per-consumer policy activation and verdict aggregation.
//!
//! For every protected call the firewall evaluates the consumer's global policies, then the
//! policies attached to the called selector, each list in insertion order. In enforcing mode the
//! first rejection aborts the call with that policy's reason. In dry-run mode every verdict is
//! recorded as a [`FirewallEvent`] and the call proceeds.

use alloy_primitives::{
    map::{HashMap, HashSet},
    Address, Selector, B256,
};
use tracing::{debug, info, trace};

use crate::{
    policy::Hook, AccessError, CallDescriptor, FirewallError, FirewallEvent, Ownable, PolicyExecutor,
    PolicyInvoker, Verdict,
};

/// Resolves the firewall admin of a consumer.
pub trait ConsumerDirectory {
    /// Firewall admin of `consumer`, if it is registered.
    fn firewall_admin(&self, consumer: Address) -> Option<Address>;
}

/// Policy activation records and dry-run flags of one firewall.
#[derive(Debug, Clone)]
pub struct Firewall {
    address: Address,
    ownable: Ownable,
    policy_status: HashMap<Address, bool>,
    global_policies: HashMap<Address, Vec<Address>>,
    selector_policies: HashMap<(Address, Selector), Vec<Address>>,
    invariant_policies: HashMap<(Address, Selector), Address>,
    dryrun: HashSet<Address>,
}

impl Firewall {
    /// Creates a firewall at `address` owned by `owner`.
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            ownable: Ownable::new(owner),
            policy_status: HashMap::default(),
            global_policies: HashMap::default(),
            selector_policies: HashMap::default(),
            invariant_policies: HashMap::default(),
            dryrun: HashSet::default(),
        }
    }

    /// Address of the firewall.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Owner of the firewall.
    pub const fn owner(&self) -> Address {
        self.ownable.owner()
    }

    /// Hands ownership to `new_owner`. Owner only.
    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<(), FirewallError> {
        Ok(self.ownable.transfer_ownership(caller, new_owner)?)
    }

    /// Approves or disapproves `policy` for use by consumers. Owner only.
    pub fn set_policy_status(&mut self, caller: Address, policy: Address, status: bool) -> Result<(), FirewallError> {
        self.ownable.check_owner(caller)?;
        self.policy_status.insert(policy, status);
        info!(firewall = %self.address, %policy, status, "Policy status updated");
        Ok(())
    }

    /// Returns whether `policy` is approved.
    pub fn policy_status(&self, policy: Address) -> bool {
        self.policy_status.get(&policy).copied().unwrap_or_default()
    }

    /// Attaches `policy` to `selector` of `consumer`. Consumer admin only.
    pub fn add_policy(
        &mut self,
        consumers: &dyn ConsumerDirectory,
        caller: Address,
        consumer: Address,
        selector: Selector,
        policy: Address,
    ) -> Result<(), FirewallError> {
        self.check_consumer_admin(consumers, caller, consumer)?;
        self.check_approved(policy)?;
        let policies = self.selector_policies.entry((consumer, selector)).or_default();
        insert_unique(policies, policy)?;
        debug!(firewall = %self.address, %consumer, %selector, %policy, "Policy added");
        Ok(())
    }

    /// Detaches `policy` from `selector` of `consumer`. Consumer admin only.
    pub fn remove_policy(
        &mut self,
        consumers: &dyn ConsumerDirectory,
        caller: Address,
        consumer: Address,
        selector: Selector,
        policy: Address,
    ) -> Result<(), FirewallError> {
        self.check_consumer_admin(consumers, caller, consumer)?;
        let policies = self.selector_policies.get_mut(&(consumer, selector)).ok_or(FirewallError::PolicyNotFound)?;
        remove_ordered(policies, policy)?;
        debug!(firewall = %self.address, %consumer, %selector, %policy, "Policy removed");
        Ok(())
    }

    /// Attaches `policy` to every selector of `consumer`. Consumer admin only.
    pub fn add_global_policy(
        &mut self,
        consumers: &dyn ConsumerDirectory,
        caller: Address,
        consumer: Address,
        policy: Address,
    ) -> Result<(), FirewallError> {
        self.check_consumer_admin(consumers, caller, consumer)?;
        self.check_approved(policy)?;
        insert_unique(self.global_policies.entry(consumer).or_default(), policy)?;
        debug!(firewall = %self.address, %consumer, %policy, "Global policy added");
        Ok(())
    }

    /// Detaches a global policy of `consumer`. Consumer admin only.
    pub fn remove_global_policy(
        &mut self,
        consumers: &dyn ConsumerDirectory,
        caller: Address,
        consumer: Address,
        policy: Address,
    ) -> Result<(), FirewallError> {
        self.check_consumer_admin(consumers, caller, consumer)?;
        let policies = self.global_policies.get_mut(&consumer).ok_or(FirewallError::PolicyNotFound)?;
        remove_ordered(policies, policy)?;
        debug!(firewall = %self.address, %consumer, %policy, "Global policy removed");
        Ok(())
    }

    /// Switches `consumer` between dry-run and enforcing mode. Consumer admin only.
    pub fn set_consumer_dryrun_status(
        &mut self,
        consumers: &dyn ConsumerDirectory,
        caller: Address,
        consumer: Address,
        status: bool,
    ) -> Result<(), FirewallError> {
        self.check_consumer_admin(consumers, caller, consumer)?;
        if status {
            self.dryrun.insert(consumer);
        } else {
            self.dryrun.remove(&consumer);
        }
        info!(firewall = %self.address, %consumer, status, "Dry-run status updated");
        Ok(())
    }

    /// Registers the private invariant policy of each selector; the zero address clears a
    /// registration. Consumer admin only.
    pub fn set_private_invariants_policy(
        &mut self,
        consumers: &dyn ConsumerDirectory,
        caller: Address,
        consumer: Address,
        selectors: &[Selector],
        policies: &[Address],
    ) -> Result<(), FirewallError> {
        self.check_consumer_admin(consumers, caller, consumer)?;
        if selectors.len() != policies.len() {
            return Err(FirewallError::LengthMismatch);
        }
        policies.iter().filter(|policy| !policy.is_zero()).try_for_each(|policy| self.check_approved(*policy))?;

        for (selector, policy) in selectors.iter().zip(policies) {
            if policy.is_zero() {
                self.invariant_policies.remove(&(consumer, *selector));
            } else {
                self.invariant_policies.insert((consumer, *selector), *policy);
            }
            debug!(firewall = %self.address, %consumer, %selector, %policy, "Private invariants policy set");
        }
        Ok(())
    }

    /// Policies attached to `selector` of `consumer`, in evaluation order.
    pub fn active_policies(&self, consumer: Address, selector: Selector) -> &[Address] {
        self.selector_policies.get(&(consumer, selector)).map(Vec::as_slice).unwrap_or_default()
    }

    /// Global policies of `consumer`, in evaluation order.
    pub fn active_global_policies(&self, consumer: Address) -> &[Address] {
        self.global_policies.get(&consumer).map(Vec::as_slice).unwrap_or_default()
    }

    /// Private invariant policy registered for `selector` of `consumer`.
    pub fn private_invariants_policy(&self, consumer: Address, selector: Selector) -> Option<Address> {
        self.invariant_policies.get(&(consumer, selector)).copied()
    }

    /// Returns whether `consumer` runs in dry-run mode.
    pub fn is_dryrun(&self, consumer: Address) -> bool {
        self.dryrun.contains(&consumer)
    }

    /// Runs every active policy's pre-execution hook for `call`.
    pub fn pre_execution(
        &self,
        invoker: &mut PolicyInvoker<'_>,
        call: &CallDescriptor,
        events: &mut Vec<FirewallEvent>,
    ) -> Result<(), FirewallError> {
        self.evaluate(invoker, call, Hook::Pre, events)
    }

    /// Runs every active policy's post-execution hook for `call`.
    pub fn post_execution(
        &self,
        invoker: &mut PolicyInvoker<'_>,
        call: &CallDescriptor,
        events: &mut Vec<FirewallEvent>,
    ) -> Result<(), FirewallError> {
        self.evaluate(invoker, call, Hook::Post, events)
    }

    /// Runs the pre-execution hook of the selector's private invariant policy.
    ///
    /// Returns the storage slots to snapshot, or `None` if no invariant policy applies or a
    /// dry-run pre-execution hook rejected.
    pub fn pre_execution_private_invariants(
        &self,
        invoker: &mut PolicyInvoker<'_>,
        call: &CallDescriptor,
        events: &mut Vec<FirewallEvent>,
    ) -> Result<Option<Vec<B256>>, FirewallError> {
        let Some(policy) = self.enabled_invariant_policy(call) else {
            return Ok(None);
        };
        let result = invoker.invariant_pre_execution(policy, self.address, call);
        if self.is_dryrun(call.consumer) {
            events.push(FirewallEvent::policy(
                self.address,
                call.consumer,
                policy,
                Hook::Pre,
                true,
                Verdict::from(&result),
            ));
            return Ok(result.ok());
        }
        result.map(Some).map_err(|source| FirewallError::Policy { policy, source })
    }

    /// Runs the post-execution hook of the selector's private invariant policy with the slot
    /// values read before and after the guarded logic.
    pub fn post_execution_private_invariants(
        &self,
        invoker: &mut PolicyInvoker<'_>,
        call: &CallDescriptor,
        pre_values: &[B256],
        post_values: &[B256],
        events: &mut Vec<FirewallEvent>,
    ) -> Result<(), FirewallError> {
        let Some(policy) = self.enabled_invariant_policy(call) else {
            return Ok(());
        };
        let result = invoker.invariant_post_execution(policy, self.address, call, pre_values, post_values);
        if self.is_dryrun(call.consumer) {
            events.push(FirewallEvent::policy(
                self.address,
                call.consumer,
                policy,
                Hook::Post,
                true,
                Verdict::from(&result),
            ));
            return Ok(());
        }
        result.map_err(|source| FirewallError::Policy { policy, source })
    }

    fn evaluate(
        &self,
        invoker: &mut PolicyInvoker<'_>,
        call: &CallDescriptor,
        hook: Hook,
        events: &mut Vec<FirewallEvent>,
    ) -> Result<(), FirewallError> {
        let dryrun = self.is_dryrun(call.consumer);
        let selector = call.selector();
        let policies = self.active_global_policies(call.consumer).iter().chain(self.active_policies(call.consumer, selector));

        for &policy in policies {
            if !self.policy_status(policy) {
                trace!(firewall = %self.address, %policy, "Skipping disapproved policy");
                continue;
            }
            let result = match hook {
                Hook::Pre => invoker.pre_execution(policy, self.address, call),
                Hook::Post => invoker.post_execution(policy, self.address, call),
            };
            if dryrun {
                if let Err(err) = &result {
                    debug!(firewall = %self.address, consumer = %call.consumer, %policy, %hook, %err, "Dry-run rejection");
                }
                events.push(FirewallEvent::policy(self.address, call.consumer, policy, hook, false, Verdict::from(&result)));
            } else if let Err(source) = result {
                debug!(firewall = %self.address, consumer = %call.consumer, %policy, %hook, err = %source, "Call rejected");
                return Err(FirewallError::Policy { policy, source });
            }
        }
        Ok(())
    }

    fn enabled_invariant_policy(&self, call: &CallDescriptor) -> Option<Address> {
        self.private_invariants_policy(call.consumer, call.selector()).filter(|policy| self.policy_status(*policy))
    }

    fn check_consumer_admin(
        &self,
        consumers: &dyn ConsumerDirectory,
        caller: Address,
        consumer: Address,
    ) -> Result<(), FirewallError> {
        if consumers.firewall_admin(consumer) == Some(caller) {
            Ok(())
        } else {
            Err(AccessError::NotConsumerAdmin.into())
        }
    }

    fn check_approved(&self, policy: Address) -> Result<(), FirewallError> {
        if self.policy_status(policy) {
            Ok(())
        } else {
            Err(FirewallError::PolicyNotApproved)
        }
    }
}

fn insert_unique(policies: &mut Vec<Address>, policy: Address) -> Result<(), FirewallError> {
    if policies.contains(&policy) {
        return Err(FirewallError::PolicyAlreadyExists);
    }
    policies.push(policy);
    Ok(())
}

fn remove_ordered(policies: &mut Vec<Address>, policy: Address) -> Result<(), FirewallError> {
    let index = policies.iter().position(|p| *p == policy).ok_or(FirewallError::PolicyNotFound)?;
    policies.remove(index);
    Ok(())
}
