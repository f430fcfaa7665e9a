//! Tests for the allowlist policy.

use alloy_primitives::{address, Address};
use onchain_firewall::{
    policy::AllowlistPolicy,
    test_utils::{
        ether, new_host, SampleConsumer, SampleContractUser, ADMIN, CONSUMER, CONTRACT_USER, FIREWALL, OTHER, OWNER,
        USER,
    },
    FirewallError, FirewallHost, Ledger, MemoryLedger, PolicyError,
};

const POLICY: Address = address!("00000000000000000000000000000000000a0c05");

fn setup(allowed: &[Address]) -> (FirewallHost<MemoryLedger>, SampleConsumer) {
    let mut host = new_host();
    let mut policy = AllowlistPolicy::new(POLICY, ADMIN);
    policy.set_consumer_allowlist(ADMIN, CONSUMER, allowed, true).unwrap();
    host.deploy_policy(policy).unwrap();
    host.set_policy_status(OWNER, FIREWALL, POLICY, true).unwrap();
    host.add_global_policy(ADMIN, CONSUMER, POLICY).unwrap();
    (host, SampleConsumer::new(CONSUMER))
}

fn not_allowed() -> Result<(), FirewallError> {
    Err(FirewallError::Policy { policy: POLICY, source: PolicyError::SenderNotAllowed })
}

#[test]
fn test_only_allowlisted_senders() {
    let (mut host, consumer) = setup(&[USER]);
    host.transact(USER, |host| consumer.deposit(host, USER, ether(1))).result.unwrap();

    let receipt = host.transact(OTHER, |host| consumer.deposit(host, OTHER, ether(1)));
    assert_eq!(receipt.result, not_allowed());
    assert_eq!(receipt.revert_reason().as_deref(), Some("AllowlistPolicy: Sender not allowed"));
}

/// The immediate sender is checked, not the transaction origin.
#[test]
fn test_checks_sender_not_origin() {
    let contract = SampleContractUser { address: CONTRACT_USER };

    let (mut host, consumer) = setup(&[USER]);
    let receipt = host.transact(USER, |host| contract.deposit_and_withdraw(host, USER, consumer, ether(1)));
    assert_eq!(receipt.result, not_allowed());

    let (mut host, consumer) = setup(&[CONTRACT_USER]);
    host.transact(USER, |host| contract.deposit_and_withdraw(host, USER, consumer, ether(1))).result.unwrap();
    assert_eq!(host.ledger().native_balance(CONTRACT_USER).unwrap(), ether(1));
}

#[test]
fn test_update_allowlist() {
    let (mut host, consumer) = setup(&[USER, OTHER]);
    let policy = host.policy_mut::<AllowlistPolicy>(POLICY).unwrap();
    assert!(policy.set_consumer_allowlist(USER, CONSUMER, &[USER], false).is_err());
    policy.set_consumer_allowlist(ADMIN, CONSUMER, &[OTHER], false).unwrap();
    assert!(policy.is_allowed(CONSUMER, USER));
    assert!(!policy.is_allowed(CONSUMER, OTHER));

    let receipt = host.transact(OTHER, |host| consumer.deposit(host, OTHER, ether(1)));
    assert_eq!(receipt.result, not_allowed());
}
