use alloy_primitives::{fixed_bytes, keccak256, Address, Bytes, Selector, B256, U256};
use alloy_sol_types::{sol, SolCall, SolValue};

use crate::{FirewallError, FirewallHost, Ledger, LedgerMut, Message, VennPayload};

sol! {
    /// ABI of the sample consumer.
    #[derive(Debug, PartialEq, Eq)]
    interface ISampleConsumer {
        function deposit() external payable;
        function withdraw(uint256 amount) external;
        function depositToken(address token, uint256 amount) external;
        function withdrawToken(address token, uint256 amount) external;
        function withdrawMany(uint256 amount, uint256 times) external;
        function setValue(uint256 value) external;
        function setMultipleValues(uint256 value, uint256 value2) external;
    }
}

/// Selector protecting the internal withdrawal section.
pub const WITHDRAW_INTERNAL_SELECTOR: Selector = fixed_bytes!("ac6a2b5d");

/// Slot written by `setValue`.
pub const VALUE_SLOT: B256 = B256::ZERO;
/// First slot written by `setMultipleValues`.
pub const FIRST_VALUE_SLOT: B256 = B256::with_last_byte(1);
/// Second slot written by `setMultipleValues`.
pub const SECOND_VALUE_SLOT: B256 = B256::with_last_byte(2);

const DEPOSITS_SLOT: u64 = 3;
const TOKEN_DEPOSITS_SLOT: u64 = 4;

/// Calldata of `deposit()`.
pub fn deposit_calldata() -> Bytes {
    ISampleConsumer::depositCall {}.abi_encode().into()
}

/// Calldata of `withdraw(amount)`.
pub fn withdraw_calldata(amount: U256) -> Bytes {
    ISampleConsumer::withdrawCall { amount }.abi_encode().into()
}

/// A vault-like consumer: accounts deposit and withdraw native value and tokens, and anyone may
/// write a few plain storage values.
///
/// With internals enabled, withdrawals run in an internally protected section under
/// [`WITHDRAW_INTERNAL_SELECTOR`], and `withdrawMany` repeats that section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleConsumer {
    /// Address of the consumer.
    pub address: Address,
    internals: bool,
}

impl SampleConsumer {
    /// A consumer protecting only its external functions.
    pub const fn new(address: Address) -> Self {
        Self { address, internals: false }
    }

    /// A consumer that also protects its internal withdrawal section.
    pub const fn with_internals(address: Address) -> Self {
        Self { address, internals: true }
    }

    /// Native deposit of `account`.
    pub fn deposit_of<L: Ledger>(&self, ledger: &L, account: Address) -> U256 {
        read(ledger, self.address, deposit_slot(account)).unwrap()
    }

    /// Token deposit of `account`.
    pub fn token_deposit_of<L: Ledger>(&self, ledger: &L, token: Address, account: Address) -> U256 {
        read(ledger, self.address, token_deposit_slot(token, account)).unwrap()
    }

    /// `deposit()` with `value` attached.
    pub fn deposit<L: LedgerMut + Clone>(
        &self,
        host: &mut FirewallHost<L>,
        sender: Address,
        value: U256,
    ) -> Result<(), FirewallError> {
        let this = *self;
        host.call(Message::new(self.address, sender, deposit_calldata()).with_value(value), move |host| {
            this.credit(host, deposit_slot(sender), value)
        })
    }

    /// `deposit()` submitted through a safe function call delivering `payload` to `venn_policy`.
    pub fn safe_deposit<L: LedgerMut + Clone>(
        &self,
        host: &mut FirewallHost<L>,
        sender: Address,
        value: U256,
        venn_policy: Address,
        payload: VennPayload,
    ) -> Result<(), FirewallError> {
        let this = *self;
        let message = Message::new(self.address, sender, deposit_calldata()).with_value(value);
        host.safe_function_call(venn_policy, payload, message, move |host| {
            this.credit(host, deposit_slot(sender), value)
        })
    }

    /// `withdraw(amount)`.
    pub fn withdraw<L: LedgerMut + Clone>(
        &self,
        host: &mut FirewallHost<L>,
        sender: Address,
        amount: U256,
    ) -> Result<(), FirewallError> {
        let this = *self;
        host.call(Message::new(self.address, sender, withdraw_calldata(amount)), move |host| {
            if this.internals {
                this.withdraw_internal(host, sender, amount)
            } else {
                this.pay_out(host, sender, amount)
            }
        })
    }

    /// `withdrawMany(amount, times)`: `times` protected internal withdrawals of `amount`.
    pub fn withdraw_many<L: LedgerMut + Clone>(
        &self,
        host: &mut FirewallHost<L>,
        sender: Address,
        amount: U256,
        times: u64,
    ) -> Result<(), FirewallError> {
        let this = *self;
        let data = ISampleConsumer::withdrawManyCall { amount, times: U256::from(times) }.abi_encode();
        host.call(Message::new(self.address, sender, data), move |host| {
            for _ in 0..times {
                this.withdraw_internal(host, sender, amount)?;
            }
            Ok(())
        })
    }

    /// `depositToken(token, amount)`.
    pub fn deposit_token<L: LedgerMut + Clone>(
        &self,
        host: &mut FirewallHost<L>,
        sender: Address,
        token: Address,
        amount: U256,
    ) -> Result<(), FirewallError> {
        let this = *self;
        let data = ISampleConsumer::depositTokenCall { token, amount }.abi_encode();
        host.call(Message::new(self.address, sender, data), move |host| {
            host.ledger_mut().transfer_token(token, sender, this.address, amount)?;
            this.credit(host, token_deposit_slot(token, sender), amount)
        })
    }

    /// `withdrawToken(token, amount)`.
    pub fn withdraw_token<L: LedgerMut + Clone>(
        &self,
        host: &mut FirewallHost<L>,
        sender: Address,
        token: Address,
        amount: U256,
    ) -> Result<(), FirewallError> {
        let this = *self;
        let data = ISampleConsumer::withdrawTokenCall { token, amount }.abi_encode();
        host.call(Message::new(self.address, sender, data), move |host| {
            this.debit(host, token_deposit_slot(token, sender), amount)?;
            host.ledger_mut().transfer_token(token, this.address, sender, amount)?;
            Ok(())
        })
    }

    /// `setValue(value)`.
    pub fn set_value<L: LedgerMut + Clone>(
        &self,
        host: &mut FirewallHost<L>,
        sender: Address,
        value: U256,
    ) -> Result<(), FirewallError> {
        let this = *self;
        let data = ISampleConsumer::setValueCall { value }.abi_encode();
        host.call(Message::new(self.address, sender, data), move |host| write(host, this.address, VALUE_SLOT, value))
    }

    /// `setMultipleValues(value, value2)`.
    pub fn set_multiple_values<L: LedgerMut + Clone>(
        &self,
        host: &mut FirewallHost<L>,
        sender: Address,
        value: U256,
        value2: U256,
    ) -> Result<(), FirewallError> {
        let this = *self;
        let data = ISampleConsumer::setMultipleValuesCall { value, value2 }.abi_encode();
        host.call(Message::new(self.address, sender, data), move |host| {
            write(host, this.address, FIRST_VALUE_SLOT, value)?;
            write(host, this.address, SECOND_VALUE_SLOT, value2)
        })
    }

    fn withdraw_internal<L: LedgerMut + Clone>(
        self,
        host: &mut FirewallHost<L>,
        sender: Address,
        amount: U256,
    ) -> Result<(), FirewallError> {
        host.guard(Message::internal(self.address, sender, WITHDRAW_INTERNAL_SELECTOR), move |host| {
            self.pay_out(host, sender, amount)
        })
    }

    fn pay_out<L: LedgerMut + Clone>(
        self,
        host: &mut FirewallHost<L>,
        recipient: Address,
        amount: U256,
    ) -> Result<(), FirewallError> {
        self.debit(host, deposit_slot(recipient), amount)?;
        host.ledger_mut().transfer_native(self.address, recipient, amount)?;
        Ok(())
    }

    fn credit<L: LedgerMut + Clone>(
        self,
        host: &mut FirewallHost<L>,
        slot: B256,
        amount: U256,
    ) -> Result<(), FirewallError> {
        let balance = read(host.ledger(), self.address, slot)?;
        write(host, self.address, slot, balance + amount)
    }

    fn debit<L: LedgerMut + Clone>(
        self,
        host: &mut FirewallHost<L>,
        slot: B256,
        amount: U256,
    ) -> Result<(), FirewallError> {
        let balance = read(host.ledger(), self.address, slot)?;
        let remaining =
            balance.checked_sub(amount).ok_or_else(|| FirewallError::revert("SampleConsumer: insufficient deposit"))?;
        write(host, self.address, slot, remaining)
    }
}

/// A contract that deposits into and withdraws from a consumer within one call, forwarding the
/// value its origin sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleContractUser {
    /// Address of the contract.
    pub address: Address,
}

impl SampleContractUser {
    /// Receives `value` from `origin`, deposits it into `consumer` and withdraws it again.
    pub fn deposit_and_withdraw<L: LedgerMut + Clone>(
        &self,
        host: &mut FirewallHost<L>,
        origin: Address,
        consumer: SampleConsumer,
        value: U256,
    ) -> Result<(), FirewallError> {
        host.ledger_mut().transfer_native(origin, self.address, value)?;
        consumer.deposit(host, self.address, value)?;
        consumer.withdraw(host, self.address, value)
    }
}

fn deposit_slot(account: Address) -> B256 {
    keccak256((account, U256::from(DEPOSITS_SLOT)).abi_encode())
}

fn token_deposit_slot(token: Address, account: Address) -> B256 {
    let inner = keccak256((token, U256::from(TOKEN_DEPOSITS_SLOT)).abi_encode());
    keccak256((account, inner).abi_encode())
}

fn read<L: Ledger>(ledger: &L, account: Address, slot: B256) -> Result<U256, FirewallError> {
    Ok(U256::from_be_bytes(ledger.storage(account, slot)?.0))
}

fn write<L: LedgerMut + Clone>(
    host: &mut FirewallHost<L>,
    account: Address,
    slot: B256,
    value: U256,
) -> Result<(), FirewallError> {
    host.ledger_mut().set_storage(account, slot, B256::from(value.to_be_bytes::<32>()))?;
    Ok(())
}
