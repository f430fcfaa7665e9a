//! Rolling hash over the sequence of selectors called within one transaction.

use alloy_primitives::{keccak256, Selector, B256};

/// Vector hash before any call has been made.
pub const VECTOR_SEED: B256 = B256::ZERO;

/// `keccak256(prev ‖ selector)`.
pub fn next_vector_hash(prev: B256, selector: Selector) -> B256 {
    let mut buf = [0u8; 36];
    buf[..32].copy_from_slice(prev.as_slice());
    buf[32..].copy_from_slice(selector.as_slice());
    keccak256(buf)
}

/// Vector hash of a complete selector sequence.
pub fn vector_hash(sequence: &[Selector]) -> B256 {
    sequence.iter().fold(VECTOR_SEED, |prev, selector| next_vector_hash(prev, *selector))
}

/// Hashes of every non-empty prefix of `sequence`, in order. Approving all of them lets each
/// call of the sequence pass as it happens.
pub fn prefix_vector_hashes(sequence: &[Selector]) -> Vec<B256> {
    sequence
        .iter()
        .scan(VECTOR_SEED, |prev, selector| {
            *prev = next_vector_hash(*prev, *selector);
            Some(*prev)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector_of;

    #[test]
    fn test_prefix_hashes_chain() {
        let deposit = selector_of("deposit()");
        let withdraw = selector_of("withdraw(uint256)");
        let prefixes = prefix_vector_hashes(&[deposit, withdraw]);
        assert_eq!(prefixes.len(), 2);
        assert_eq!(prefixes[0], next_vector_hash(VECTOR_SEED, deposit));
        assert_eq!(prefixes[1], next_vector_hash(prefixes[0], withdraw));
        assert_eq!(prefixes[1], vector_hash(&[deposit, withdraw]));
        assert_ne!(vector_hash(&[withdraw, deposit]), prefixes[1]);
        assert_eq!(vector_hash(&[]), VECTOR_SEED);
    }
}
