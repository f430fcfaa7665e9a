//! Tests for the approved vectors policy: the selectors a transaction calls on a consumer must
//! form an approved sequence.

use alloy_primitives::{address, Address, Selector};
use alloy_sol_types::SolCall;
use onchain_firewall::{
    policy::ApprovedVectorsPolicy,
    test_utils::{ether, new_host, ISampleConsumer, SampleConsumer, ADMIN, CONSUMER, FIREWALL, OWNER, USER},
    vector_hash, FirewallError, FirewallHost, MemoryLedger, PolicyError,
};

const POLICY: Address = address!("00000000000000000000000000000000000a0c02");

const DEPOSIT: Selector = Selector::new(ISampleConsumer::depositCall::SELECTOR);
const WITHDRAW: Selector = Selector::new(ISampleConsumer::withdrawCall::SELECTOR);

fn setup(sequences: &[&[Selector]]) -> (FirewallHost<MemoryLedger>, SampleConsumer) {
    let mut host = new_host();
    let mut policy = ApprovedVectorsPolicy::new(POLICY, FIREWALL, ADMIN);
    for sequence in sequences {
        policy.approve_sequence(ADMIN, sequence).unwrap();
    }
    host.deploy_policy(policy).unwrap();
    host.policy_base_mut(POLICY).unwrap().set_consumers_statuses(ADMIN, &[CONSUMER], &[true]).unwrap();
    host.set_policy_status(OWNER, FIREWALL, POLICY, true).unwrap();
    host.add_global_policy(ADMIN, CONSUMER, POLICY).unwrap();
    (host, SampleConsumer::new(CONSUMER))
}

fn unapproved() -> Result<(), FirewallError> {
    Err(FirewallError::Policy { policy: POLICY, source: PolicyError::UnapprovedVector })
}

/// Single-selector vectors allow each call in its own transaction but not both in one.
#[test]
fn test_single_selector_vectors() {
    let (mut host, consumer) = setup(&[&[DEPOSIT], &[WITHDRAW]]);

    host.transact(USER, |host| consumer.deposit(host, USER, ether(1))).result.unwrap();
    host.transact(USER, |host| consumer.withdraw(host, USER, ether(1))).result.unwrap();

    let receipt = host.transact(USER, |host| {
        consumer.deposit(host, USER, ether(1))?;
        consumer.withdraw(host, USER, ether(1))
    });
    assert_eq!(receipt.result, unapproved());
}

/// Approving `deposit, withdraw` approves its prefix but not the lone second selector.
#[test]
fn test_sequence_approves_prefixes() {
    let (mut host, consumer) = setup(&[&[DEPOSIT, WITHDRAW]]);

    let receipt = host.transact(USER, |host| {
        consumer.deposit(host, USER, ether(1))?;
        consumer.withdraw(host, USER, ether(1))
    });
    receipt.result.unwrap();

    host.transact(USER, |host| consumer.deposit(host, USER, ether(1))).result.unwrap();
    let receipt = host.transact(USER, |host| consumer.withdraw(host, USER, ether(1)));
    assert_eq!(receipt.result, unapproved());
    assert_eq!(receipt.revert_reason().as_deref(), Some("ApprovedVectorsPolicy: Unapproved Vector"));
}

/// Vector state does not leak across transactions.
#[test]
fn test_vector_resets_per_transaction() {
    let (mut host, consumer) = setup(&[&[DEPOSIT]]);
    for _ in 0..3 {
        host.transact(USER, |host| consumer.deposit(host, USER, ether(1))).result.unwrap();
    }
    let policy = host.policy::<ApprovedVectorsPolicy>(POLICY).unwrap();
    assert!(policy.is_approved(vector_hash(&[DEPOSIT])));
    assert!(!policy.is_approved(vector_hash(&[DEPOSIT, DEPOSIT])));
}

/// Revoking a vector hash takes effect immediately; only policy admins may change the set.
#[test]
fn test_vector_hash_status_admin() {
    let (mut host, consumer) = setup(&[&[DEPOSIT]]);
    let policy = host.policy_mut::<ApprovedVectorsPolicy>(POLICY).unwrap();
    assert!(policy.set_vector_hash_status(USER, vector_hash(&[DEPOSIT]), false).is_err());
    policy.set_vector_hash_status(ADMIN, vector_hash(&[DEPOSIT]), false).unwrap();

    let receipt = host.transact(USER, |host| consumer.deposit(host, USER, ether(1)));
    assert_eq!(receipt.result, unapproved());
}
