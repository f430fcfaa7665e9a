use alloy_primitives::{Address, Bytes, Selector, B256, U256};
use onchain_firewall::{
    constants::NATIVE_TOKEN, BlockEnv, FirewallError, FirewallEvent, FirewallHost, HostConfig, LedgerMut,
    LedgerState, MemoryLedger, Message, Receipt, VennPayload,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::common;

/// A deployment, its starting state and the transactions to run against it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Scenario {
    /// Firewalls, policies and consumers.
    #[serde(default)]
    pub host: HostConfig,
    /// Starting balances and storage.
    #[serde(default)]
    pub state: LedgerState,
    /// Transactions, in execution order.
    #[serde(default)]
    pub transactions: Vec<TransactionSpec>,
}

/// One transaction.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransactionSpec {
    /// Account signing the transaction.
    pub origin: Address,
    /// Top-level calls, in order.
    #[serde(default)]
    pub calls: Vec<CallSpec>,
}

/// A call into a consumer and the logic it runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CallSpec {
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
    /// Payload delivered to a venn policy first, turning the call into a safe function call.
    #[serde(default)]
    pub venn: Option<VennDelivery>,
    /// Guarded logic.
    #[serde(default)]
    pub effects: Vec<Effect>,
}

impl CallSpec {
    fn message(&self) -> Message {
        Message::new(self.consumer, self.sender, self.data.clone()).with_value(self.value)
    }
}

/// A payload for a consumer-approved policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VennDelivery {
    /// Receiving policy.
    pub policy: Address,
    /// The payload.
    pub payload: VennPayload,
}

/// A step of guarded logic.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Effect {
    /// Moves a balance. The token defaults to the native one.
    Transfer {
        /// Token moved.
        #[serde(default = "native_token")]
        token: Address,
        /// Payer.
        from: Address,
        /// Payee.
        to: Address,
        /// Amount.
        amount: U256,
    },
    /// Writes a storage slot.
    Store {
        /// Account whose storage is written.
        account: Address,
        /// Slot.
        slot: B256,
        /// New value.
        value: B256,
    },
    /// Calls another consumer, or reenters the current one.
    Call(Box<CallSpec>),
    /// Runs an internally protected section of the current consumer under `selector`.
    Guard {
        /// Selector of the section.
        selector: Selector,
        /// Logic of the section.
        #[serde(default)]
        effects: Vec<Effect>,
    },
    /// Reverts with `reason`.
    Revert {
        /// Revert reason.
        reason: String,
    },
}

const fn native_token() -> Address {
    NATIVE_TOKEN
}

/// What happened to one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOutcome {
    /// Transaction id.
    pub tx: u64,
    /// Signing account.
    pub origin: Address,
    /// Block the transaction was included in.
    pub block: BlockEnv,
    /// Whether it succeeded.
    pub success: bool,
    /// Revert reason of a failed transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// `Error(string)` revert data of a failed transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revert_data: Option<Bytes>,
    /// Dry-run events.
    pub events: Vec<FirewallEvent>,
}

impl From<Receipt<()>> for TransactionOutcome {
    fn from(receipt: Receipt<()>) -> Self {
        let error = receipt.result.as_ref().err();
        Self {
            tx: receipt.tx.id,
            origin: receipt.tx.origin,
            block: receipt.block,
            success: receipt.is_success(),
            reason: error.map(ToString::to_string),
            revert_data: error.map(FirewallError::revert_data),
            events: receipt.events,
        }
    }
}

/// Outcome of a whole scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutput {
    /// One outcome per transaction.
    pub transactions: Vec<TransactionOutcome>,
    /// Ledger state after the last transaction, if requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<LedgerState>,
}

impl Scenario {
    /// Deploys the scenario and runs its transactions. Transaction reverts are outcomes, not
    /// errors; only a deployment that cannot be applied fails.
    pub fn simulate(self, dump_state: bool) -> common::Result<SimulationOutput> {
        let mut host = FirewallHost::from_config(self.host, MemoryLedger::from_state(self.state))?;
        info!(transactions = self.transactions.len(), "Running scenario");

        let transactions = self
            .transactions
            .iter()
            .map(|spec| {
                let receipt = host.transact(spec.origin, |host| {
                    spec.calls.iter().try_for_each(|call| run_call(host, call))
                });
                debug!(tx = receipt.tx.id, success = receipt.is_success(), "Transaction finished");
                TransactionOutcome::from(receipt)
            })
            .collect();

        let state = dump_state.then(|| host.ledger().clone().into_state());
        Ok(SimulationOutput { transactions, state })
    }
}

fn run_call<L: LedgerMut + Clone>(host: &mut FirewallHost<L>, call: &CallSpec) -> Result<(), FirewallError> {
    let body = |host: &mut FirewallHost<L>| apply_effects(host, call, &call.effects);
    match &call.venn {
        Some(venn) => host.safe_function_call(venn.policy, venn.payload.clone(), call.message(), body),
        None => host.call(call.message(), body),
    }
}

fn apply_effects<L: LedgerMut + Clone>(
    host: &mut FirewallHost<L>,
    call: &CallSpec,
    effects: &[Effect],
) -> Result<(), FirewallError> {
    for effect in effects {
        match effect {
            Effect::Transfer { token, from, to, amount } => host.ledger_mut().transfer(*token, *from, *to, *amount)?,
            Effect::Store { account, slot, value } => host.ledger_mut().set_storage(*account, *slot, *value)?,
            Effect::Call(inner) => run_call(host, inner)?,
            Effect::Guard { selector, effects } => {
                let message = Message::internal(call.consumer, call.sender, *selector);
                host.guard(message, |host| apply_effects(host, call, effects))?;
            }
            Effect::Revert { reason } => return Err(FirewallError::revert(reason.clone())),
        }
    }
    Ok(())
}
