//! In-memory [`Ledger`] backend.

use alloy_primitives::{map::HashMap, Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::{constants::NATIVE_TOKEN, Ledger, LedgerError, LedgerMut};

/// Balances and storage held by a [`MemoryLedger`].
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerState {
    /// Native balances.
    #[serde(default)]
    pub native: HashMap<Address, U256>,
    /// Token balances, keyed by token then account.
    #[serde(default)]
    pub tokens: HashMap<Address, HashMap<Address, U256>>,
    /// Storage, keyed by account then slot.
    #[serde(default)]
    pub storage: HashMap<Address, HashMap<B256, B256>>,
}

/// A ledger kept entirely in memory. Missing entries read as zero.
#[derive(Debug, Default, Clone, PartialEq, Eq, derive_more::Deref, derive_more::DerefMut)]
pub struct MemoryLedger {
    #[deref]
    #[deref_mut]
    state: LedgerState,
}

impl MemoryLedger {
    /// Creates a ledger from existing state.
    pub const fn from_state(state: LedgerState) -> Self {
        Self { state }
    }

    /// Consumes the ledger, returning its state.
    pub fn into_state(self) -> LedgerState {
        self.state
    }

    /// Sets the native balance of an account.
    pub fn set_account_balance(&mut self, account: Address, balance: U256) {
        self.state.native.insert(account, balance);
    }

    /// Sets the native balance of an account.
    pub fn with_account_balance(mut self, account: Address, balance: U256) -> Self {
        self.set_account_balance(account, balance);
        self
    }

    /// Sets the balance of an account in `token`.
    pub fn set_token_balance(&mut self, token: Address, account: Address, balance: U256) {
        self.state.tokens.entry(token).or_default().insert(account, balance);
    }

    /// Sets the balance of an account in `token`.
    pub fn with_token_balance(mut self, token: Address, account: Address, balance: U256) -> Self {
        self.set_token_balance(token, account, balance);
        self
    }

    /// Sets a storage slot of an account.
    pub fn set_account_storage(&mut self, account: Address, slot: B256, value: B256) {
        self.state.storage.entry(account).or_default().insert(slot, value);
    }

    /// Sets a storage slot of an account.
    pub fn with_account_storage(mut self, account: Address, slot: B256, value: B256) -> Self {
        self.set_account_storage(account, slot, value);
        self
    }
}

/// Debits `from` and credits `to` within one balance table.
fn move_balance(
    balances: &mut HashMap<Address, U256>,
    token: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<(), LedgerError> {
    let available = balances.get(&from).copied().unwrap_or_default();
    let remaining = available.checked_sub(amount).ok_or(LedgerError::InsufficientBalance {
        token,
        account: from,
        available,
        required: amount,
    })?;
    balances.insert(from, remaining);
    let credited = balances.entry(to).or_default();
    *credited = credited.saturating_add(amount);
    Ok(())
}

impl Ledger for MemoryLedger {
    fn native_balance(&self, account: Address) -> Result<U256, LedgerError> {
        Ok(self.state.native.get(&account).copied().unwrap_or_default())
    }

    fn token_balance(&self, token: Address, account: Address) -> Result<U256, LedgerError> {
        Ok(self.state.tokens.get(&token).and_then(|balances| balances.get(&account)).copied().unwrap_or_default())
    }

    fn storage(&self, account: Address, slot: B256) -> Result<B256, LedgerError> {
        Ok(self.state.storage.get(&account).and_then(|slots| slots.get(&slot)).copied().unwrap_or_default())
    }
}

impl LedgerMut for MemoryLedger {
    fn transfer_native(&mut self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        move_balance(&mut self.state.native, NATIVE_TOKEN, from, to, amount)
    }

    fn transfer_token(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError> {
        move_balance(self.state.tokens.entry(token).or_default(), token, from, to, amount)
    }

    fn set_storage(&mut self, account: Address, slot: B256, value: B256) -> Result<(), LedgerError> {
        self.set_account_storage(account, slot, value);
        Ok(())
    }
}
