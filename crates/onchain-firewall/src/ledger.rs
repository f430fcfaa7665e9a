//! The state abstraction policies read and consumers mutate.

use alloy_primitives::{Address, B256, U256};
use auto_impl::auto_impl;

use crate::constants::NATIVE_TOKEN;

/// Errors raised by a [`Ledger`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A transfer exceeds the payer's balance.
    #[error("insufficient balance of {token} for {account}: have {available}, need {required}")]
    InsufficientBalance {
        /// Asset being moved, [`NATIVE_TOKEN`] for the native one.
        token: Address,
        /// Paying account.
        account: Address,
        /// Its balance.
        available: U256,
        /// Requested amount.
        required: U256,
    },
    /// Backend-specific failure.
    #[error("ledger backend error: {0}")]
    Backend(String),
}

/// Read access to balances and storage.
#[auto_impl(&, &mut, Box, Arc)]
pub trait Ledger {
    /// Native balance of `account`.
    fn native_balance(&self, account: Address) -> Result<U256, LedgerError>;

    /// Balance of `account` in the fungible `token`.
    fn token_balance(&self, token: Address, account: Address) -> Result<U256, LedgerError>;

    /// Value of the storage `slot` of `account`.
    fn storage(&self, account: Address, slot: B256) -> Result<B256, LedgerError>;

    /// Balance of `account` in `token`, where [`NATIVE_TOKEN`] selects the native balance.
    fn balance_of(&self, token: Address, account: Address) -> Result<U256, LedgerError> {
        if token == NATIVE_TOKEN {
            self.native_balance(account)
        } else {
            self.token_balance(token, account)
        }
    }
}

/// Write access used by consumer logic and the host.
#[auto_impl(&mut, Box)]
pub trait LedgerMut: Ledger {
    /// Moves native value between accounts.
    fn transfer_native(&mut self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError>;

    /// Moves `amount` of `token` between accounts.
    fn transfer_token(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError>;

    /// Writes a storage slot of `account`.
    fn set_storage(&mut self, account: Address, slot: B256, value: B256) -> Result<(), LedgerError>;

    /// Moves `amount` of `token`, where [`NATIVE_TOKEN`] selects the native asset.
    fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        if token == NATIVE_TOKEN {
            self.transfer_native(from, to, amount)
        } else {
            self.transfer_token(token, from, to, amount)
        }
    }
}
