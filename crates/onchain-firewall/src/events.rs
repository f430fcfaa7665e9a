//! Dry-run telemetry emitted by the firewall.

use alloy_primitives::{Address, Log};
use alloy_sol_types::{sol, SolEvent};
use serde::Serialize;

use crate::{policy::Hook, revert_data, Verdict};

sol! {
    /// Events a firewall emits for consumers in dry-run mode.
    #[derive(Debug, PartialEq, Eq)]
    interface IFirewall {
        event DryrunPolicyPreSuccess(address indexed consumer, address indexed policy);
        event DryrunPolicyPostSuccess(address indexed consumer, address indexed policy);
        event DryrunPolicyPreError(address indexed consumer, address indexed policy, bytes error);
        event DryrunPolicyPostError(address indexed consumer, address indexed policy, bytes error);
        event DryrunInvariantPolicyPreSuccess(address indexed consumer, address indexed policy);
        event DryrunInvariantPolicyPostSuccess(address indexed consumer, address indexed policy);
        event DryrunInvariantPolicyPreError(address indexed consumer, address indexed policy, bytes error);
        event DryrunInvariantPolicyPostError(address indexed consumer, address indexed policy, bytes error);
    }
}

/// Kind of a [`FirewallEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display, Serialize)]
pub enum EventKind {
    /// A policy approved in the pre-execution hook.
    DryrunPolicyPreSuccess,
    /// A policy approved in the post-execution hook.
    DryrunPolicyPostSuccess,
    /// A policy rejected in the pre-execution hook.
    DryrunPolicyPreError,
    /// A policy rejected in the post-execution hook.
    DryrunPolicyPostError,
    /// An invariant policy approved in the pre-execution hook.
    DryrunInvariantPolicyPreSuccess,
    /// An invariant policy approved in the post-execution hook.
    DryrunInvariantPolicyPostSuccess,
    /// An invariant policy rejected in the pre-execution hook.
    DryrunInvariantPolicyPreError,
    /// An invariant policy rejected in the post-execution hook.
    DryrunInvariantPolicyPostError,
}

/// A dry-run verdict recorded by a firewall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallEvent {
    /// What happened.
    pub kind: EventKind,
    /// Firewall that emitted the event.
    pub firewall: Address,
    /// Protected consumer.
    pub consumer: Address,
    /// Evaluated policy.
    pub policy: Address,
    /// Rejection reason, for error events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FirewallEvent {
    /// Builds the event for a policy `verdict`.
    pub(crate) fn policy(
        firewall: Address,
        consumer: Address,
        policy: Address,
        hook: Hook,
        invariant: bool,
        verdict: Verdict,
    ) -> Self {
        let kind = match (invariant, hook, verdict.approved) {
            (false, Hook::Pre, true) => EventKind::DryrunPolicyPreSuccess,
            (false, Hook::Post, true) => EventKind::DryrunPolicyPostSuccess,
            (false, Hook::Pre, false) => EventKind::DryrunPolicyPreError,
            (false, Hook::Post, false) => EventKind::DryrunPolicyPostError,
            (true, Hook::Pre, true) => EventKind::DryrunInvariantPolicyPreSuccess,
            (true, Hook::Post, true) => EventKind::DryrunInvariantPolicyPostSuccess,
            (true, Hook::Pre, false) => EventKind::DryrunInvariantPolicyPreError,
            (true, Hook::Post, false) => EventKind::DryrunInvariantPolicyPostError,
        };
        Self { kind, firewall, consumer, policy, reason: verdict.reason }
    }

    /// ABI-encoded log of the event, as the firewall contract would emit it. The error payload of
    /// error events is `Error(string)` revert data.
    pub fn to_log(&self) -> Log {
        let (consumer, policy) = (self.consumer, self.policy);
        let error = || revert_data(self.reason.as_deref().unwrap_or_default());
        let data = match self.kind {
            EventKind::DryrunPolicyPreSuccess => {
                IFirewall::DryrunPolicyPreSuccess { consumer, policy }.encode_log_data()
            }
            EventKind::DryrunPolicyPostSuccess => {
                IFirewall::DryrunPolicyPostSuccess { consumer, policy }.encode_log_data()
            }
            EventKind::DryrunPolicyPreError => {
                IFirewall::DryrunPolicyPreError { consumer, policy, error: error() }.encode_log_data()
            }
            EventKind::DryrunPolicyPostError => {
                IFirewall::DryrunPolicyPostError { consumer, policy, error: error() }.encode_log_data()
            }
            EventKind::DryrunInvariantPolicyPreSuccess => {
                IFirewall::DryrunInvariantPolicyPreSuccess { consumer, policy }.encode_log_data()
            }
            EventKind::DryrunInvariantPolicyPostSuccess => {
                IFirewall::DryrunInvariantPolicyPostSuccess { consumer, policy }.encode_log_data()
            }
            EventKind::DryrunInvariantPolicyPreError => {
                IFirewall::DryrunInvariantPolicyPreError { consumer, policy, error: error() }.encode_log_data()
            }
            EventKind::DryrunInvariantPolicyPostError => {
                IFirewall::DryrunInvariantPolicyPostError { consumer, policy, error: error() }.encode_log_data()
            }
        };
        Log { address: self.firewall, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, keccak256, B256};
    use alloy_sol_types::{Revert, SolError};

    #[test]
    fn test_error_event_log_encoding() {
        let event = FirewallEvent {
            kind: EventKind::DryrunPolicyPreError,
            firewall: address!("00000000000000000000000000000000000000f1"),
            consumer: address!("00000000000000000000000000000000000000c1"),
            policy: address!("00000000000000000000000000000000000000a1"),
            reason: Some("AllowlistPolicy: Sender not allowed".into()),
        };
        let log = event.to_log();
        assert_eq!(log.address, event.firewall);

        let topics = log.data.topics();
        assert_eq!(topics[0], keccak256("DryrunPolicyPreError(address,address,bytes)"));
        assert_eq!(topics[1], B256::left_padding_from(event.consumer.as_slice()));
        assert_eq!(topics[2], B256::left_padding_from(event.policy.as_slice()));

        let decoded = IFirewall::DryrunPolicyPreError::decode_log_data(&log.data, true).unwrap();
        let revert = Revert::abi_decode(&decoded.error, true).unwrap();
        assert_eq!(revert.reason, "AllowlistPolicy: Sender not allowed");
    }

    #[test]
    fn test_success_event_has_no_payload() {
        let event = FirewallEvent::policy(
            Address::ZERO,
            Address::ZERO,
            Address::ZERO,
            Hook::Post,
            true,
            Verdict::approved(),
        );
        assert_eq!(event.kind, EventKind::DryrunInvariantPolicyPostSuccess);
        assert!(event.to_log().data.data.is_empty());
    }
}
