//! Tests for the combined policies policy: member verdicts are collected as a row and checked
//! against a truth table.

use alloy_primitives::{address, Address, Selector, U256};
use alloy_sol_types::SolCall;
use onchain_firewall::{
    constants::NATIVE_TOKEN,
    policy::{
        AllowlistPolicy, ApprovedVectorsPolicy, BalanceChangePolicy, CombinedPoliciesPolicy, ForbiddenMethodsPolicy,
    },
    test_utils::{
        ether, micro_ether, new_host, ISampleConsumer, SampleConsumer, ADMIN, CONSUMER, FIREWALL, OTHER, OWNER, USER,
        WITHDRAW_INTERNAL_SELECTOR,
    },
    FirewallError, FirewallHost, MemoryLedger, PolicyError,
};
use rstest::rstest;

const COMBINED: Address = address!("00000000000000000000000000000000000a0c10");
const BALANCE: Address = address!("00000000000000000000000000000000000a0c11");
const ALLOWLIST: Address = address!("00000000000000000000000000000000000a0c12");
const FORBIDDEN: Address = address!("00000000000000000000000000000000000a0c13");
const VECTORS: Address = address!("00000000000000000000000000000000000a0c14");

const WITHDRAW: Selector = Selector::new(ISampleConsumer::withdrawCall::SELECTOR);
const WITHDRAW_MANY: Selector = Selector::new(ISampleConsumer::withdrawManyCall::SELECTOR);

/// Every row but "both members rejected".
fn at_least_one() -> Vec<Vec<bool>> {
    vec![vec![true, true], vec![true, false], vec![false, true]]
}

/// Deploys the combined policy over `members`, approves only it on the firewall and attaches it
/// globally.
fn combine(host: &mut FirewallHost<MemoryLedger>, members: Vec<Address>) {
    let mut combined = CombinedPoliciesPolicy::new(COMBINED, FIREWALL, ADMIN);
    combined.set_allowed_combinations(ADMIN, members, at_least_one()).unwrap();
    host.deploy_policy(combined).unwrap();
    host.policy_base_mut(COMBINED).unwrap().set_consumers_statuses(ADMIN, &[CONSUMER], &[true]).unwrap();
    host.set_policy_status(OWNER, FIREWALL, COMBINED, true).unwrap();
    host.add_global_policy(ADMIN, CONSUMER, COMBINED).unwrap();
}

/// Makes the combined policy an approved executor of a member with a policy base.
fn enlist(host: &mut FirewallHost<MemoryLedger>, member: Address) {
    let base = host.policy_base_mut(member).unwrap();
    base.set_executor_status(ADMIN, COMBINED, true).unwrap();
    base.set_consumers_statuses(ADMIN, &[CONSUMER], &[true]).unwrap();
}

/// Balance change limited to one ether, combined with an allowlist holding only [`USER`].
fn balance_or_allowlist() -> FirewallHost<MemoryLedger> {
    let mut host = new_host();
    let mut balance = BalanceChangePolicy::new(BALANCE, FIREWALL, ADMIN);
    balance.set_consumer_max_balance_change(ADMIN, CONSUMER, NATIVE_TOKEN, ether(1)).unwrap();
    host.deploy_policy(balance).unwrap();
    enlist(&mut host, BALANCE);

    let mut allowlist = AllowlistPolicy::new(ALLOWLIST, ADMIN);
    allowlist.set_consumer_allowlist(ADMIN, CONSUMER, &[USER], true).unwrap();
    host.deploy_policy(allowlist).unwrap();

    combine(&mut host, vec![BALANCE, ALLOWLIST]);
    host
}

/// Forbidden `withdrawMany`, combined with vectors allowing at most two internal withdrawals.
fn forbidden_or_vectors() -> FirewallHost<MemoryLedger> {
    let mut host = new_host();
    let mut forbidden = ForbiddenMethodsPolicy::new(FORBIDDEN, ADMIN);
    forbidden.set_consumer_forbidden_method(ADMIN, CONSUMER, WITHDRAW_MANY, true).unwrap();
    host.deploy_policy(forbidden).unwrap();

    let mut vectors = ApprovedVectorsPolicy::new(VECTORS, FIREWALL, ADMIN);
    vectors
        .approve_sequence(ADMIN, &[WITHDRAW_MANY, WITHDRAW_INTERNAL_SELECTOR, WITHDRAW_INTERNAL_SELECTOR])
        .unwrap();
    vectors.approve_sequence(ADMIN, &[WITHDRAW, WITHDRAW_INTERNAL_SELECTOR]).unwrap();
    host.deploy_policy(vectors).unwrap();
    enlist(&mut host, VECTORS);

    combine(&mut host, vec![FORBIDDEN, VECTORS]);
    host
}

fn disallowed() -> Result<(), FirewallError> {
    Err(FirewallError::Policy { policy: COMBINED, source: PolicyError::DisallowedCombination })
}

#[rstest]
#[case::both_approve(USER, ether(1))]
#[case::only_balance_approves(OTHER, ether(1))]
#[case::only_allowlist_approves(USER, ether(1) + micro_ether(1))]
fn test_one_approving_member_is_enough(#[case] sender: Address, #[case] value: U256) {
    let mut host = balance_or_allowlist();
    let consumer = SampleConsumer::new(CONSUMER);
    host.transact(sender, |host| consumer.deposit(host, sender, value)).result.unwrap();
    assert_eq!(consumer.deposit_of(host.ledger(), sender), value);
}

#[test]
fn test_no_approving_member_reverts() {
    let mut host = balance_or_allowlist();
    let consumer = SampleConsumer::new(CONSUMER);
    let receipt = host.transact(OTHER, |host| consumer.deposit(host, OTHER, ether(1) + micro_ether(1)));
    assert_eq!(receipt.result, disallowed());
    assert_eq!(receipt.revert_reason().as_deref(), Some("CombinedPoliciesPolicy: Disallowed combination"));
    assert_eq!(consumer.deposit_of(host.ledger(), OTHER), U256::ZERO);
}

/// Members run in the order they were listed, so swapping them changes which rows pass.
#[test]
fn test_rows_follow_member_order() {
    let mut host = balance_or_allowlist();
    let combined = host.policy_mut::<CombinedPoliciesPolicy>(COMBINED).unwrap();
    combined.set_allowed_combinations(ADMIN, vec![ALLOWLIST, BALANCE], vec![vec![true, false]]).unwrap();
    assert_eq!(combined.policies(), &[ALLOWLIST, BALANCE]);

    let consumer = SampleConsumer::new(CONSUMER);
    host.transact(USER, |host| consumer.deposit(host, USER, ether(2))).result.unwrap();
    let receipt = host.transact(USER, |host| consumer.deposit(host, USER, ether(1)));
    assert_eq!(receipt.result, disallowed());
}

/// The forbidden method taints the whole transaction, so the third internal withdrawal (an
/// unapproved vector) leaves no member approving.
#[rstest]
#[case(1, true)]
#[case(2, true)]
#[case(3, false)]
fn test_withdraw_many(#[case] times: u64, #[case] succeeds: bool) {
    let mut host = forbidden_or_vectors();
    let consumer = SampleConsumer::with_internals(CONSUMER);

    host.transact(USER, |host| consumer.deposit(host, USER, ether(1) + micro_ether(1))).result.unwrap();
    host.transact(USER, |host| consumer.withdraw(host, USER, ether(1))).result.unwrap();
    host.transact(OTHER, |host| consumer.deposit(host, OTHER, ether(100))).result.unwrap();

    let receipt = host.transact(OTHER, |host| consumer.withdraw_many(host, OTHER, ether(1), times));
    if succeeds {
        receipt.result.unwrap();
        assert_eq!(consumer.deposit_of(host.ledger(), OTHER), ether(100 - times));
    } else {
        assert_eq!(receipt.result, disallowed());
        assert_eq!(consumer.deposit_of(host.ledger(), OTHER), ether(100));
    }
}

#[test]
fn test_invalid_combinations() {
    let mut combined = CombinedPoliciesPolicy::new(COMBINED, FIREWALL, ADMIN);
    assert_eq!(
        combined.set_allowed_combinations(ADMIN, vec![COMBINED], vec![vec![true]]),
        Err(PolicyError::InvalidCombination("policy cannot combine itself"))
    );
    assert_eq!(
        combined.set_allowed_combinations(ADMIN, vec![BALANCE, ALLOWLIST], vec![vec![true]]),
        Err(PolicyError::InvalidCombination("combination length mismatch"))
    );
    assert!(combined.set_allowed_combinations(USER, vec![BALANCE], vec![vec![true]]).is_err());
    assert!(combined.policies().is_empty());
}
