//! Invariants over a consumer's private storage, checked around protected calls.

use alloy_primitives::{map::HashMap, Address, Selector, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{CallDescriptor, InvariantPolicy, Ownable, PolicyEnv, PolicyError};

/// A predicate over the values of the registered slots. Indices refer to positions in the slot
/// list of the (consumer, selector) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum InvariantRule {
    /// The slot must be non-zero after the call.
    NonZero {
        /// Slot index.
        index: usize,
        /// Revert reason on violation.
        reason: String,
    },
    /// The slot may not move by more than `max` during the call.
    MaxDelta {
        /// Slot index.
        index: usize,
        /// Largest allowed absolute change.
        max: U256,
        /// Revert reason on violation.
        reason: String,
    },
    /// Two slots may not differ by more than `max` after the call.
    MaxSpread {
        /// First slot index.
        a: usize,
        /// Second slot index.
        b: usize,
        /// Largest allowed absolute difference.
        max: U256,
        /// Revert reason on violation.
        reason: String,
    },
}

impl InvariantRule {
    /// Checks the rule against the slot values read before and after a call.
    pub fn check(&self, pre: &[B256], post: &[B256]) -> Result<(), PolicyError> {
        let value = |values: &[B256], index: usize| {
            values.get(index).map(|v| U256::from_be_bytes(v.0)).ok_or(PolicyError::InvariantValuesMismatch)
        };
        let holds = match self {
            Self::NonZero { index, .. } => !value(post, *index)?.is_zero(),
            Self::MaxDelta { index, max, .. } => abs_diff(value(pre, *index)?, value(post, *index)?) <= *max,
            Self::MaxSpread { a, b, max, .. } => abs_diff(value(post, *a)?, value(post, *b)?) <= *max,
        };
        if holds {
            Ok(())
        } else {
            Err(PolicyError::InvariantViolation(self.reason().to_string()))
        }
    }

    /// Revert reason of the rule.
    pub fn reason(&self) -> &str {
        match self {
            Self::NonZero { reason, .. } | Self::MaxDelta { reason, .. } | Self::MaxSpread { reason, .. } => reason,
        }
    }
}

fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Snapshots registered storage slots of a consumer around a protected call and checks the
/// registered rules over the before/after values.
#[derive(Debug, Clone)]
pub struct PrivateInvariantsPolicy {
    address: Address,
    ownable: Ownable,
    slots: HashMap<(Address, Selector), Vec<B256>>,
    rules: HashMap<(Address, Selector), Vec<InvariantRule>>,
}

impl PrivateInvariantsPolicy {
    /// Creates the policy at `address` owned by `owner`.
    pub fn new(address: Address, owner: Address) -> Self {
        Self { address, ownable: Ownable::new(owner), slots: HashMap::default(), rules: HashMap::default() }
    }

    /// Owner of the policy.
    pub const fn owner(&self) -> Address {
        self.ownable.owner()
    }

    /// Registers the storage slots to snapshot for `selector` of `consumer`. Owner only.
    pub fn set_sighash_invariant_storage_slots(
        &mut self,
        caller: Address,
        consumer: Address,
        selector: Selector,
        slots: Vec<B256>,
    ) -> Result<(), PolicyError> {
        self.ownable.check_owner(caller)?;
        debug!(policy = %self.address, %consumer, %selector, count = slots.len(), "Invariant slots set");
        self.slots.insert((consumer, selector), slots);
        Ok(())
    }

    /// Registers the rules checked for `selector` of `consumer`. Owner only.
    pub fn set_sighash_invariant_rules(
        &mut self,
        caller: Address,
        consumer: Address,
        selector: Selector,
        rules: Vec<InvariantRule>,
    ) -> Result<(), PolicyError> {
        self.ownable.check_owner(caller)?;
        debug!(policy = %self.address, %consumer, %selector, count = rules.len(), "Invariant rules set");
        self.rules.insert((consumer, selector), rules);
        Ok(())
    }

    /// Slots registered for `selector` of `consumer`.
    pub fn storage_slots(&self, consumer: Address, selector: Selector) -> &[B256] {
        self.slots.get(&(consumer, selector)).map(Vec::as_slice).unwrap_or_default()
    }
}

impl InvariantPolicy for PrivateInvariantsPolicy {
    fn address(&self) -> Address {
        self.address
    }

    fn name(&self) -> &'static str {
        "PrivateInvariantsPolicy"
    }

    fn pre_execution(&mut self, _env: &mut PolicyEnv<'_>, call: &CallDescriptor) -> Result<Vec<B256>, PolicyError> {
        Ok(self.storage_slots(call.consumer, call.selector()).to_vec())
    }

    fn post_execution(
        &mut self,
        _env: &mut PolicyEnv<'_>,
        call: &CallDescriptor,
        pre_values: &[B256],
        post_values: &[B256],
    ) -> Result<(), PolicyError> {
        let key = (call.consumer, call.selector());
        let slots = self.slots.get(&key).map(Vec::len).unwrap_or_default();
        if pre_values.len() != slots || post_values.len() != slots {
            return Err(PolicyError::InvariantValuesMismatch);
        }
        trace!(consumer = %call.consumer, ?pre_values, ?post_values, "Checking private invariants");
        for rule in self.rules.get(&key).into_iter().flatten() {
            rule.check(pre_values, post_values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word(value: u64) -> B256 {
        B256::from(U256::from(value))
    }

    #[test]
    fn test_rules() {
        let non_zero = InvariantRule::NonZero { index: 0, reason: "INVARIANT1".into() };
        assert!(non_zero.check(&[word(0)], &[word(1)]).is_ok());
        assert_eq!(
            non_zero.check(&[word(1)], &[word(0)]),
            Err(PolicyError::InvariantViolation("INVARIANT1".into()))
        );

        let delta = InvariantRule::MaxDelta { index: 0, max: U256::from(10), reason: "DELTA".into() };
        assert!(delta.check(&[word(100)], &[word(90)]).is_ok());
        assert!(delta.check(&[word(100)], &[word(111)]).is_err());

        let spread = InvariantRule::MaxSpread { a: 0, b: 1, max: U256::from(50), reason: "INVARIANT2".into() };
        assert!(spread.check(&[], &[word(10), word(60)]).is_ok());
        assert_eq!(spread.check(&[], &[word(10), word(61)]).unwrap_err().to_string(), "INVARIANT2");
        assert_eq!(spread.check(&[], &[word(10)]), Err(PolicyError::InvariantValuesMismatch));
    }
}
