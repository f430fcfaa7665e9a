//! Host runtime tying a ledger, firewalls, policies and consumers together.
//!
//! The host plays the chain: it runs transactions atomically, moves call value and drives the
//! consumer side of the protection protocol around guarded logic supplied as closures.

use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, Selector, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, trace, warn};

use crate::{
    constants::DEFAULT_BLOCK_TIME, policy::ApprovedCallsPolicy, BlockEnv, CallDescriptor, Consumers, EventKind,
    Firewall, FirewallError, FirewallEvent, InvariantPolicy, LedgerMut, Policy, PolicyBase, PolicyError,
    PolicyRegistry, TxEnv, VennPayload,
};

/// A call into a consumer made within a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Called consumer.
    pub consumer: Address,
    /// Immediate caller.
    pub sender: Address,
    /// Calldata.
    #[serde(default)]
    pub data: Bytes,
    /// Attached native value.
    #[serde(default)]
    pub value: U256,
}

impl Message {
    /// Creates a message without value.
    pub fn new(consumer: Address, sender: Address, data: impl Into<Bytes>) -> Self {
        Self { consumer, sender, data: data.into(), value: U256::ZERO }
    }

    /// Creates a message carrying only `selector`, as used for internally protected sections.
    pub fn internal(consumer: Address, sender: Address, selector: Selector) -> Self {
        Self::new(consumer, sender, selector.to_vec())
    }

    /// Sets the attached value.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Outcome of a transaction.
#[derive(Debug)]
pub struct Receipt<T> {
    /// Transaction environment it ran in.
    pub tx: TxEnv,
    /// Block it was included in.
    pub block: BlockEnv,
    /// Output, or the error that reverted it.
    pub result: Result<T, FirewallError>,
    /// Events emitted; empty if the transaction reverted.
    pub events: Vec<FirewallEvent>,
}

impl<T> Receipt<T> {
    /// Returns whether the transaction succeeded.
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Revert reason of a failed transaction.
    pub fn revert_reason(&self) -> Option<String> {
        self.result.as_ref().err().map(ToString::to_string)
    }

    /// Returns whether an event of `kind` was emitted.
    pub fn emitted(&self, kind: EventKind) -> bool {
        self.events.iter().any(|event| event.kind == kind)
    }

    /// Events of `kind`, in emission order.
    pub fn events_of(&self, kind: EventKind) -> impl Iterator<Item = &FirewallEvent> {
        self.events.iter().filter(move |event| event.kind == kind)
    }
}

#[derive(Debug, Clone)]
struct Checkpoint<L> {
    ledger: L,
    registry: PolicyRegistry,
    firewalls: BTreeMap<Address, Firewall>,
    consumers: Consumers,
    events: usize,
}

/// Runs protected calls against a ledger.
#[derive(Debug)]
pub struct FirewallHost<L> {
    ledger: L,
    block: BlockEnv,
    block_time: u64,
    registry: PolicyRegistry,
    firewalls: BTreeMap<Address, Firewall>,
    consumers: Consumers,
    events: Vec<FirewallEvent>,
    tx: Option<TxEnv>,
    last_tx_id: u64,
    /// Protected calls currently executing their guarded logic.
    depth: u32,
}

impl<L: LedgerMut + Clone> FirewallHost<L> {
    /// Creates a host over `ledger` starting at `block`.
    pub fn new(ledger: L, block: BlockEnv) -> Self {
        Self {
            ledger,
            block,
            block_time: DEFAULT_BLOCK_TIME,
            registry: PolicyRegistry::default(),
            firewalls: BTreeMap::new(),
            consumers: Consumers::default(),
            events: Vec::new(),
            tx: None,
            last_tx_id: 0,
            depth: 0,
        }
    }

    /// Sets the seconds each mined block advances the clock by.
    pub const fn with_block_time(mut self, block_time: u64) -> Self {
        self.block_time = block_time;
        self
    }

    /// Current block.
    pub const fn block(&self) -> &BlockEnv {
        &self.block
    }

    /// Moves the clock forward.
    pub const fn advance_time(&mut self, seconds: u64) {
        self.block.timestamp += seconds;
    }

    /// The ledger.
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Mutable access to the ledger, for guarded logic and setup.
    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }

    /// Current transaction, if one is executing.
    pub const fn tx(&self) -> Option<TxEnv> {
        self.tx
    }

    /// Events emitted so far in the current transaction.
    pub fn events(&self) -> &[FirewallEvent] {
        &self.events
    }

    /// Deploys a firewall at `address` owned by `owner`.
    pub fn deploy_firewall(&mut self, address: Address, owner: Address) -> Result<(), FirewallError> {
        if self.firewalls.contains_key(&address) {
            return Err(FirewallError::FirewallExists(address));
        }
        self.firewalls.insert(address, Firewall::new(address, owner));
        Ok(())
    }

    /// The firewall at `address`.
    pub fn firewall(&self, address: Address) -> Option<&Firewall> {
        self.firewalls.get(&address)
    }

    /// Deploys a call policy.
    pub fn deploy_policy<P: Policy + 'static>(&mut self, policy: P) -> Result<Address, FirewallError> {
        let address = self.registry.deploy(policy)?;
        debug!(policy = %address, "Policy deployed");
        Ok(address)
    }

    /// Deploys an invariant policy.
    pub fn deploy_invariant_policy<P: InvariantPolicy + 'static>(&mut self, policy: P) -> Result<Address, FirewallError> {
        let address = self.registry.deploy_invariant(policy)?;
        debug!(policy = %address, "Invariant policy deployed");
        Ok(address)
    }

    /// Deployed policies.
    pub const fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// The call policy of type `P` at `address`.
    pub fn policy<P: Policy + 'static>(&self, address: Address) -> Option<&P> {
        self.registry.get(address)
    }

    /// Mutable access to the call policy of type `P` at `address`, for its admin surface.
    pub fn policy_mut<P: Policy + 'static>(&mut self, address: Address) -> Option<&mut P> {
        self.registry.get_mut(address)
    }

    /// Mutable access to the invariant policy of type `P` at `address`.
    pub fn invariant_policy_mut<P: InvariantPolicy + 'static>(&mut self, address: Address) -> Option<&mut P> {
        self.registry.get_invariant_mut(address)
    }

    /// Executor and consumer gating of the policy at `address`.
    pub fn policy_base_mut(&mut self, address: Address) -> Option<&mut PolicyBase> {
        self.registry.base_mut(address)
    }

    /// Registers `consumer` behind `firewall`, administered by `admin`.
    pub fn register_consumer(&mut self, consumer: Address, firewall: Address, admin: Address) -> Result<(), FirewallError> {
        self.consumers.register(consumer, firewall, admin)
    }

    /// Registered consumers.
    pub const fn consumers(&self) -> &Consumers {
        &self.consumers
    }

    /// Mutable access to consumer settings, for their admin surface.
    pub fn consumers_mut(&mut self) -> &mut Consumers {
        &mut self.consumers
    }

    /// Approves or disapproves `policy` on `firewall`. Firewall owner only.
    pub fn set_policy_status(
        &mut self,
        caller: Address,
        firewall: Address,
        policy: Address,
        status: bool,
    ) -> Result<(), FirewallError> {
        self.firewalls
            .get_mut(&firewall)
            .ok_or(FirewallError::UnknownFirewall(firewall))?
            .set_policy_status(caller, policy, status)
    }

    /// Attaches `policy` to `selector` of `consumer` on the consumer's firewall.
    pub fn add_policy(
        &mut self,
        caller: Address,
        consumer: Address,
        selector: Selector,
        policy: Address,
    ) -> Result<(), FirewallError> {
        let (firewall, consumers) = self.consumer_firewall_mut(consumer)?;
        firewall.add_policy(consumers, caller, consumer, selector, policy)
    }

    /// Detaches `policy` from `selector` of `consumer`.
    pub fn remove_policy(
        &mut self,
        caller: Address,
        consumer: Address,
        selector: Selector,
        policy: Address,
    ) -> Result<(), FirewallError> {
        let (firewall, consumers) = self.consumer_firewall_mut(consumer)?;
        firewall.remove_policy(consumers, caller, consumer, selector, policy)
    }

    /// Attaches `policy` to every selector of `consumer`.
    pub fn add_global_policy(&mut self, caller: Address, consumer: Address, policy: Address) -> Result<(), FirewallError> {
        let (firewall, consumers) = self.consumer_firewall_mut(consumer)?;
        firewall.add_global_policy(consumers, caller, consumer, policy)
    }

    /// Detaches a global policy of `consumer`.
    pub fn remove_global_policy(&mut self, caller: Address, consumer: Address, policy: Address) -> Result<(), FirewallError> {
        let (firewall, consumers) = self.consumer_firewall_mut(consumer)?;
        firewall.remove_global_policy(consumers, caller, consumer, policy)
    }

    /// Switches `consumer` between dry-run and enforcing mode.
    pub fn set_consumer_dryrun_status(&mut self, caller: Address, consumer: Address, status: bool) -> Result<(), FirewallError> {
        let (firewall, consumers) = self.consumer_firewall_mut(consumer)?;
        firewall.set_consumer_dryrun_status(consumers, caller, consumer, status)
    }

    /// Registers private invariant policies for selectors of `consumer`.
    pub fn set_private_invariants_policy(
        &mut self,
        caller: Address,
        consumer: Address,
        selectors: &[Selector],
        policies: &[Address],
    ) -> Result<(), FirewallError> {
        let (firewall, consumers) = self.consumer_firewall_mut(consumer)?;
        firewall.set_private_invariants_policy(consumers, caller, consumer, selectors, policies)
    }

    /// Runs `f` as a transaction signed by `origin`, in a newly mined block.
    ///
    /// If `f` fails, every state change it made is rolled back and its events are dropped.
    pub fn transact<T>(
        &mut self,
        origin: Address,
        f: impl FnOnce(&mut Self) -> Result<T, FirewallError>,
    ) -> Receipt<T> {
        if let Some(tx) = self.tx {
            return Receipt { tx, block: self.block, result: Err(FirewallError::TransactionActive), events: Vec::new() };
        }

        self.block.number += 1;
        self.block.timestamp += self.block_time;
        self.last_tx_id += 1;
        let tx = TxEnv { id: self.last_tx_id, origin };
        self.tx = Some(tx);

        let _span = debug_span!("transact", tx = tx.id, %origin, block = self.block.number).entered();
        let checkpoint = self.checkpoint();
        let result = f(self);
        match &result {
            Ok(_) => debug!(events = self.events.len(), "Transaction succeeded"),
            Err(err) => {
                debug!(%err, "Transaction reverted");
                self.restore(checkpoint);
            }
        }

        self.tx = None;
        Receipt { tx, block: self.block, result, events: std::mem::take(&mut self.events) }
    }

    /// Calls a consumer: moves the attached value to it, then runs `body` under the protection of
    /// its firewall. Reverts every change of the call on failure.
    pub fn call<T>(
        &mut self,
        message: Message,
        body: impl FnOnce(&mut Self) -> Result<T, FirewallError>,
    ) -> Result<T, FirewallError> {
        self.atomically(|host| {
            if !message.value.is_zero() {
                host.ledger.transfer_native(message.sender, message.consumer, message.value)?;
            }
            host.protect(message, body)
        })
    }

    /// Runs `body` under the protection of the consumer's firewall without moving value, as an
    /// internally protected section of a consumer does.
    pub fn guard<T>(
        &mut self,
        message: Message,
        body: impl FnOnce(&mut Self) -> Result<T, FirewallError>,
    ) -> Result<T, FirewallError> {
        self.atomically(|host| host.protect(message, body))
    }

    /// Delivers `payload` to the consumer-approved `venn_policy`, then calls the consumer with
    /// `message`.
    pub fn safe_function_call<T>(
        &mut self,
        venn_policy: Address,
        payload: VennPayload,
        message: Message,
        body: impl FnOnce(&mut Self) -> Result<T, FirewallError>,
    ) -> Result<T, FirewallError> {
        self.atomically(|host| {
            let consumer =
                host.consumers.get(message.consumer).ok_or(FirewallError::UnknownConsumer(message.consumer))?;
            if !consumer.is_approved_venn_policy(venn_policy) {
                return Err(FirewallError::UnapprovedVennPolicy);
            }
            host.deliver(venn_policy, payload)?;
            host.call(message, body)
        })
    }

    fn deliver(&mut self, venn_policy: Address, payload: VennPayload) -> Result<(), FirewallError> {
        match payload {
            VennPayload::ApproveCallsViaSignature { bundle, signature } => {
                let block = self.block;
                let policy = self
                    .registry
                    .get_mut::<ApprovedCallsPolicy>(venn_policy)
                    .ok_or(PolicyError::NotDeployed(venn_policy))?;
                policy.approve_calls_via_signature(&block, bundle, &signature)?;
            }
        }
        Ok(())
    }

    fn protect<T>(
        &mut self,
        message: Message,
        body: impl FnOnce(&mut Self) -> Result<T, FirewallError>,
    ) -> Result<T, FirewallError> {
        let tx = self.tx.ok_or(FirewallError::NoActiveTransaction)?;
        let call = CallDescriptor {
            consumer: message.consumer,
            sender: message.sender,
            origin: tx.origin,
            data: message.data,
            value: message.value,
            execution_context: None,
        };

        let Some(firewall) = self.protecting_firewall(call.consumer) else {
            trace!(consumer = %call.consumer, "Unprotected call");
            return body(self);
        };
        let _span = debug_span!("protected_call", consumer = %call.consumer, selector = %call.selector()).entered();

        let depth = self.depth;
        let slots = self.pre_execution(firewall, tx, depth, &call)?;
        let pre_values = slots.as_deref().map(|slots| self.read_slots(call.consumer, slots)).transpose()?;

        self.depth += 1;
        let output = body(self);
        self.depth -= 1;
        let output = output?;

        if let (Some(slots), Some(pre_values)) = (slots, pre_values) {
            let post_values = self.read_slots(call.consumer, &slots)?;
            self.post_execution_private_invariants(firewall, tx, depth, &call, &pre_values, &post_values)?;
        }
        self.post_execution(firewall, tx, depth, &call)?;
        Ok(output)
    }

    fn pre_execution(
        &mut self,
        firewall: Address,
        tx: TxEnv,
        depth: u32,
        call: &CallDescriptor,
    ) -> Result<Option<Vec<B256>>, FirewallError> {
        let Self { ledger, block, registry, firewalls, events, .. } = self;
        let firewall = firewalls.get(&firewall).ok_or(FirewallError::UnknownFirewall(firewall))?;
        let mut invoker = registry.invoker(&*ledger, *block, tx, depth);
        firewall.pre_execution(&mut invoker, call, events)?;
        firewall.pre_execution_private_invariants(&mut invoker, call, events)
    }

    fn post_execution_private_invariants(
        &mut self,
        firewall: Address,
        tx: TxEnv,
        depth: u32,
        call: &CallDescriptor,
        pre_values: &[B256],
        post_values: &[B256],
    ) -> Result<(), FirewallError> {
        let Self { ledger, block, registry, firewalls, events, .. } = self;
        let firewall = firewalls.get(&firewall).ok_or(FirewallError::UnknownFirewall(firewall))?;
        let mut invoker = registry.invoker(&*ledger, *block, tx, depth);
        firewall.post_execution_private_invariants(&mut invoker, call, pre_values, post_values, events)
    }

    fn post_execution(&mut self, firewall: Address, tx: TxEnv, depth: u32, call: &CallDescriptor) -> Result<(), FirewallError> {
        let Self { ledger, block, registry, firewalls, events, .. } = self;
        let firewall = firewalls.get(&firewall).ok_or(FirewallError::UnknownFirewall(firewall))?;
        let mut invoker = registry.invoker(&*ledger, *block, tx, depth);
        firewall.post_execution(&mut invoker, call, events)
    }

    fn read_slots(&self, consumer: Address, slots: &[B256]) -> Result<Vec<B256>, FirewallError> {
        slots.iter().map(|slot| Ok(self.ledger.storage(consumer, *slot)?)).collect()
    }

    /// Firewall protecting `consumer`, if it is registered behind a deployed firewall.
    fn protecting_firewall(&self, consumer: Address) -> Option<Address> {
        let firewall = self.consumers.get(consumer)?.firewall();
        if firewall.is_zero() {
            return None;
        }
        if !self.firewalls.contains_key(&firewall) {
            warn!(%consumer, %firewall, "Consumer points at an unknown firewall, running unprotected");
            return None;
        }
        Some(firewall)
    }

    /// Firewall of `consumer`, along with the consumer directory its admin checks read.
    fn consumer_firewall_mut(&mut self, consumer: Address) -> Result<(&mut Firewall, &Consumers), FirewallError> {
        let Self { firewalls, consumers, .. } = self;
        let firewall = consumers.get(consumer).ok_or(FirewallError::UnknownConsumer(consumer))?.firewall();
        let firewall = firewalls.get_mut(&firewall).ok_or(FirewallError::UnknownFirewall(firewall))?;
        Ok((firewall, &*consumers))
    }

    fn atomically<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, FirewallError>) -> Result<T, FirewallError> {
        let checkpoint = self.checkpoint();
        let result = f(self);
        if result.is_err() {
            self.restore(checkpoint);
        }
        result
    }

    fn checkpoint(&self) -> Checkpoint<L> {
        Checkpoint {
            ledger: self.ledger.clone(),
            registry: self.registry.clone(),
            firewalls: self.firewalls.clone(),
            consumers: self.consumers.clone(),
            events: self.events.len(),
        }
    }

    fn restore(&mut self, checkpoint: Checkpoint<L>) {
        self.ledger = checkpoint.ledger;
        self.registry = checkpoint.registry;
        self.firewalls = checkpoint.firewalls;
        self.consumers = checkpoint.consumers;
        self.events.truncate(checkpoint.events);
    }
}
