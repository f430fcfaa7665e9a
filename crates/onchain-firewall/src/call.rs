//! Identity of a protected call.

use alloy_primitives::{keccak256, Address, Bytes, Selector, B256, U256};
use serde::{Deserialize, Serialize};

/// The facts a firewall and its policies see about one protected call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDescriptor {
    /// The protected contract being called.
    pub consumer: Address,
    /// Immediate caller of the consumer.
    pub sender: Address,
    /// Externally owned account that signed the enclosing transaction.
    pub origin: Address,
    /// Full calldata, selector included.
    pub data: Bytes,
    /// Native value attached to the call.
    pub value: U256,
    /// Opaque context word some deployments bind into the identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_context: Option<U256>,
}

impl CallDescriptor {
    /// Creates a descriptor without value or execution context.
    pub fn new(consumer: Address, sender: Address, origin: Address, data: impl Into<Bytes>) -> Self {
        Self { consumer, sender, origin, data: data.into(), value: U256::ZERO, execution_context: None }
    }

    /// Sets the attached value.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the execution context word.
    pub fn with_execution_context(mut self, context: U256) -> Self {
        self.execution_context = Some(context);
        self
    }

    /// The 4-byte function selector. Calldata shorter than four bytes is zero right-padded.
    pub fn selector(&self) -> Selector {
        selector_from_calldata(&self.data)
    }

    /// The call hash policies approve: see [`call_hash`].
    pub fn call_hash(&self) -> B256 {
        call_hash(self.consumer, self.sender, self.origin, &self.data, self.value)
    }

    /// Hash over every field of the descriptor. Equal to [`Self::call_hash`] when no execution
    /// context is set.
    pub fn identity(&self) -> B256 {
        match self.execution_context {
            None => self.call_hash(),
            Some(context) => {
                let mut buf = packed_call(self.consumer, self.sender, self.origin, &self.data, self.value);
                buf.extend_from_slice(&context.to_be_bytes::<32>());
                keccak256(buf)
            }
        }
    }
}

/// `keccak256(abi.encodePacked(consumer, sender, origin, data, value))`.
pub fn call_hash(consumer: Address, sender: Address, origin: Address, data: &[u8], value: U256) -> B256 {
    keccak256(packed_call(consumer, sender, origin, data, value))
}

fn packed_call(consumer: Address, sender: Address, origin: Address, data: &[u8], value: U256) -> Vec<u8> {
    let mut buf = Vec::with_capacity(3 * 20 + data.len() + 32);
    buf.extend_from_slice(consumer.as_slice());
    buf.extend_from_slice(sender.as_slice());
    buf.extend_from_slice(origin.as_slice());
    buf.extend_from_slice(data);
    buf.extend_from_slice(&value.to_be_bytes::<32>());
    buf
}

/// Extracts the selector of raw calldata.
pub fn selector_from_calldata(data: &[u8]) -> Selector {
    let mut selector = [0u8; 4];
    let len = data.len().min(4);
    selector[..len].copy_from_slice(&data[..len]);
    Selector::from(selector)
}

/// Selector of a function signature such as `"withdraw(uint256)"`.
pub fn selector_of(signature: &str) -> Selector {
    Selector::from_slice(&keccak256(signature.as_bytes())[..4])
}
