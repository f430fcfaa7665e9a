//! Error types of the firewall, its policies and their admin surfaces.
//!
//! Display strings are the revert reasons a caller observes; [`revert_data`] encodes them the way
//! a Solidity `require` would.

use alloy_primitives::{Address, Bytes, B256};
use alloy_sol_types::{Revert, SolError};

use crate::{BundleError, LedgerError};

/// Failed permission check on an admin surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// The account lacks a required role.
    #[error("AccessControl: account {account:#x} is missing role {role:#x}")]
    MissingRole {
        /// Account that was checked.
        account: Address,
        /// Role it lacks.
        role: B256,
    },
    /// Caller is not the owner.
    #[error("Ownable: caller is not the owner")]
    NotOwner,
    /// Caller is not the firewall admin of the consumer it configures.
    #[error("Firewall: not consumer admin")]
    NotConsumerAdmin,
    /// Caller is not the consumer's firewall admin.
    #[error("FirewallConsumer: not firewall admin")]
    NotFirewallAdmin,
    /// Caller is not the pending firewall admin.
    #[error("FirewallConsumer: not new admin")]
    NotPendingFirewallAdmin,
}

/// A policy's disapproval or a failed policy admin operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// Role or ownership check failed.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// The policy was invoked by an address that is not one of its executors.
    #[error("FirewallPolicy: Only authorized executors")]
    UnauthorizedExecutor,
    /// The policy does not serve this consumer.
    #[error("FirewallPolicy: Only approved consumers")]
    UnapprovedConsumer,
    /// Parallel input arrays have different lengths.
    #[error("FirewallPolicy: arrays length mismatch")]
    LengthMismatch,
    /// No live admin approval exists for the call hash.
    #[error("AdminCallPolicy: Call not approved")]
    NotApproved,
    /// Sender is not allowlisted for the consumer.
    #[error("AllowlistPolicy: Sender not allowed")]
    SenderNotAllowed,
    /// The origin has no approved call hashes left.
    #[error("ApprovedCallsPolicy: call hashes empty")]
    CallHashesEmpty,
    /// The next approved call hash is not the one being executed.
    #[error("ApprovedCallsPolicy: invalid call hash")]
    InvalidCallHash,
    /// The approval bundle expired.
    #[error("ApprovedCallsPolicy: expired")]
    Expired,
    /// Signature recovery failed or the signer lacks the signer role.
    #[error("ApprovedCallsPolicy: invalid signer")]
    InvalidSignature,
    /// Bundle nonce is not the origin's next nonce.
    #[error("ApprovedCallsPolicy: invalid nonce")]
    InvalidNonce,
    /// Bundle was issued for another chain.
    #[error("ApprovedCallsPolicy: invalid chain id")]
    ChainMismatch,
    /// Bundle was issued for another policy instance.
    #[error("ApprovedCallsPolicy: invalid policy")]
    PolicyMismatch,
    /// The transaction's selector sequence is not approved.
    #[error("ApprovedVectorsPolicy: Unapproved Vector")]
    UnapprovedVector,
    /// A tracked balance moved more than its configured limit.
    #[error("BalanceChangePolicy: Balance change exceeds limit")]
    LimitExceeded,
    /// A post-execution hook found no matching pre-execution snapshot.
    #[error("{policy}: missing pre-execution state")]
    MissingSnapshot {
        /// Name of the policy kind.
        policy: &'static str,
    },
    /// The member verdict tuple is not an allowed combination.
    #[error("CombinedPoliciesPolicy: Disallowed combination")]
    DisallowedCombination,
    /// A combination table does not fit its member list.
    #[error("CombinedPoliciesPolicy: {0}")]
    InvalidCombination(&'static str),
    /// The transaction entered a forbidden method.
    #[error("ForbiddenMethodsPolicy: Forbidden method")]
    ForbiddenMethod,
    /// A private invariant rule was violated; carries the rule's reason.
    #[error("{0}")]
    InvariantViolation(String),
    /// Slot values handed to an invariant check do not match the registered slots.
    #[error("PrivateInvariantsPolicy: storage values length mismatch")]
    InvariantValuesMismatch,
    /// The consumer was entered again before its protected call finished.
    #[error("NonReentrantPolicy: reentrant call")]
    Reentrancy,
    /// Sender is a contract rather than the transaction origin.
    #[error("OnlyEOAPolicy: Only EOA")]
    NotEoa,
    /// No policy is deployed at the address, or it is currently executing.
    #[error("no policy deployed at {0}")]
    NotDeployed(Address),
    /// A policy was invoked through the wrong hook family.
    #[error("policy at {0} has the wrong kind for this hook")]
    WrongKind(Address),
    /// Reading the ledger failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<BundleError> for PolicyError {
    fn from(err: BundleError) -> Self {
        match err {
            BundleError::ChainMismatch { .. } => Self::ChainMismatch,
            BundleError::PolicyMismatch { .. } => Self::PolicyMismatch,
            BundleError::Expired { .. } => Self::Expired,
            BundleError::InvalidSignature => Self::InvalidSignature,
        }
    }
}

impl PolicyError {
    /// Revert data a contract would return for this error.
    pub fn revert_data(&self) -> Bytes {
        revert_data(&self.to_string())
    }
}

/// Failure of a firewall operation or of a protected call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FirewallError {
    /// Access check failed.
    #[error(transparent)]
    Access(#[from] AccessError),
    /// A policy disapproved the call in enforcing mode.
    #[error("{source}")]
    Policy {
        /// Address of the disapproving policy.
        policy: Address,
        /// The policy's reason.
        source: PolicyError,
    },
    /// A policy admin operation failed.
    #[error(transparent)]
    PolicyAdmin(#[from] PolicyError),
    /// The policy has not been approved by the firewall owner.
    #[error("Firewall: policy not approved")]
    PolicyNotApproved,
    /// The policy is already attached to the list.
    #[error("Firewall: policy already exists")]
    PolicyAlreadyExists,
    /// The policy is not attached to the list.
    #[error("Firewall: policy not found")]
    PolicyNotFound,
    /// Parallel input arrays have different lengths.
    #[error("Firewall: arrays length mismatch")]
    LengthMismatch,
    /// The policy used in a safe function call is not approved by the consumer.
    #[error("FirewallConsumer: Not approved Venn policy")]
    UnapprovedVennPolicy,
    /// The guarded logic of a consumer reverted.
    #[error("{0}")]
    Reverted(String),
    /// No firewall is deployed at the address.
    #[error("unknown firewall {0}")]
    UnknownFirewall(Address),
    /// A firewall is already deployed at the address.
    #[error("firewall {0} already deployed")]
    FirewallExists(Address),
    /// No consumer is registered at the address.
    #[error("unknown consumer {0}")]
    UnknownConsumer(Address),
    /// A consumer is already registered at the address.
    #[error("consumer {0} already registered")]
    ConsumerExists(Address),
    /// A policy is already deployed at the address.
    #[error("policy {0} already deployed")]
    PolicyExists(Address),
    /// A call was made outside of a transaction.
    #[error("no active transaction")]
    NoActiveTransaction,
    /// A transaction was started while another one is active.
    #[error("transaction already active")]
    TransactionActive,
    /// Ledger mutation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl FirewallError {
    /// Creates a revert with a custom reason, as guarded consumer logic would.
    pub fn revert(reason: impl Into<String>) -> Self {
        Self::Reverted(reason.into())
    }

    /// Revert data a contract would return for this error.
    pub fn revert_data(&self) -> Bytes {
        revert_data(&self.to_string())
    }
}

/// ABI-encodes `reason` as Solidity `Error(string)` revert data.
pub fn revert_data(reason: &str) -> Bytes {
    Revert { reason: reason.to_string() }.abi_encode().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_sol_types::SolError;

    #[test]
    fn test_policy_reason_survives_wrapping() {
        let err = FirewallError::Policy { policy: Address::ZERO, source: PolicyError::CallHashesEmpty };
        assert_eq!(err.to_string(), "ApprovedCallsPolicy: call hashes empty");
    }

    #[test]
    fn test_revert_data_round_trip() {
        let data = PolicyError::ForbiddenMethod.revert_data();
        assert_eq!(&data[..4], &Revert::SELECTOR[..]);
        let decoded = Revert::abi_decode(&data, true).unwrap();
        assert_eq!(decoded.reason, "ForbiddenMethodsPolicy: Forbidden method");
    }
}
