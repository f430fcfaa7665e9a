//! Tests for the firewall dispatcher: admin surface, evaluation order, dry-run mode and rollback.

use alloy_primitives::{address, Address, Selector};
use alloy_sol_types::SolCall;
use onchain_firewall::{
    policy::{AllowlistPolicy, ForbiddenMethodsPolicy},
    test_utils::{
        deposit_calldata, ether, new_host, ISampleConsumer, SampleConsumer, ADMIN, CONSUMER, FIREWALL, OTHER, OWNER,
        USER,
    },
    AccessError, EventKind, FirewallError, FirewallHost, Ledger, MemoryLedger, Message, PolicyError,
};

const GLOBAL: Address = address!("00000000000000000000000000000000000a0c06");
const SELECTOR: Address = address!("00000000000000000000000000000000000a0c07");
const FORBIDDEN: Address = address!("00000000000000000000000000000000000a0c0d");

const DEPOSIT: Selector = Selector::new(ISampleConsumer::depositCall::SELECTOR);

/// Two allowlists: [`GLOBAL`] admits only [`USER`] and is global, [`SELECTOR`] admits no one and
/// is attached to `deposit`. Neither is approved or attached yet.
fn setup() -> (FirewallHost<MemoryLedger>, SampleConsumer) {
    let mut host = new_host();
    let mut global = AllowlistPolicy::new(GLOBAL, ADMIN);
    global.set_consumer_allowlist(ADMIN, CONSUMER, &[USER], true).unwrap();
    host.deploy_policy(global).unwrap();
    host.deploy_policy(AllowlistPolicy::new(SELECTOR, ADMIN)).unwrap();
    (host, SampleConsumer::new(CONSUMER))
}

fn attach_both(host: &mut FirewallHost<MemoryLedger>) {
    host.set_policy_status(OWNER, FIREWALL, GLOBAL, true).unwrap();
    host.set_policy_status(OWNER, FIREWALL, SELECTOR, true).unwrap();
    host.add_global_policy(ADMIN, CONSUMER, GLOBAL).unwrap();
    host.add_policy(ADMIN, CONSUMER, DEPOSIT, SELECTOR).unwrap();
}

fn rejected_by(policy: Address) -> Result<(), FirewallError> {
    Err(FirewallError::Policy { policy, source: PolicyError::SenderNotAllowed })
}

#[test]
fn test_admin_surface() {
    let (mut host, _) = setup();

    assert_eq!(
        host.set_policy_status(ADMIN, FIREWALL, GLOBAL, true),
        Err(FirewallError::Access(AccessError::NotOwner))
    );
    assert_eq!(host.add_global_policy(ADMIN, CONSUMER, GLOBAL), Err(FirewallError::PolicyNotApproved));
    assert_eq!(host.add_policy(ADMIN, CONSUMER, DEPOSIT, GLOBAL), Err(FirewallError::PolicyNotApproved));

    host.set_policy_status(OWNER, FIREWALL, GLOBAL, true).unwrap();
    assert_eq!(
        host.add_global_policy(OWNER, CONSUMER, GLOBAL),
        Err(FirewallError::Access(AccessError::NotConsumerAdmin))
    );
    host.add_global_policy(ADMIN, CONSUMER, GLOBAL).unwrap();
    assert_eq!(host.add_global_policy(ADMIN, CONSUMER, GLOBAL), Err(FirewallError::PolicyAlreadyExists));
    host.add_policy(ADMIN, CONSUMER, DEPOSIT, GLOBAL).unwrap();
    assert_eq!(host.add_policy(ADMIN, CONSUMER, DEPOSIT, GLOBAL), Err(FirewallError::PolicyAlreadyExists));

    let firewall = host.firewall(FIREWALL).unwrap();
    assert_eq!(firewall.active_global_policies(CONSUMER), &[GLOBAL]);
    assert_eq!(firewall.active_policies(CONSUMER, DEPOSIT), &[GLOBAL]);

    host.remove_policy(ADMIN, CONSUMER, DEPOSIT, GLOBAL).unwrap();
    assert_eq!(host.remove_policy(ADMIN, CONSUMER, DEPOSIT, GLOBAL), Err(FirewallError::PolicyNotFound));
    host.remove_global_policy(ADMIN, CONSUMER, GLOBAL).unwrap();
    assert_eq!(host.remove_global_policy(ADMIN, CONSUMER, GLOBAL), Err(FirewallError::PolicyNotFound));
    assert!(host.firewall(FIREWALL).unwrap().active_global_policies(CONSUMER).is_empty());

    assert_eq!(
        host.set_private_invariants_policy(ADMIN, CONSUMER, &[DEPOSIT], &[]),
        Err(FirewallError::LengthMismatch)
    );
    assert_eq!(
        host.set_consumer_dryrun_status(USER, CONSUMER, true),
        Err(FirewallError::Access(AccessError::NotConsumerAdmin))
    );
    assert_eq!(host.add_global_policy(ADMIN, OTHER, GLOBAL), Err(FirewallError::UnknownConsumer(OTHER)));
}

/// Global policies run before selector policies, and the first rejection wins.
#[test]
fn test_global_policies_run_first() {
    let (mut host, consumer) = setup();
    attach_both(&mut host);

    let receipt = host.transact(OTHER, |host| consumer.deposit(host, OTHER, ether(1)));
    assert_eq!(receipt.result, rejected_by(GLOBAL));

    let receipt = host.transact(USER, |host| consumer.deposit(host, USER, ether(1)));
    assert_eq!(receipt.result, rejected_by(SELECTOR));

    host.remove_policy(ADMIN, CONSUMER, DEPOSIT, SELECTOR).unwrap();
    host.transact(USER, |host| consumer.deposit(host, USER, ether(1))).result.unwrap();
}

/// Disapproving a policy on the firewall disables it everywhere it is attached.
#[test]
fn test_disapproved_policies_are_skipped() {
    let (mut host, consumer) = setup();
    attach_both(&mut host);
    host.set_policy_status(OWNER, FIREWALL, GLOBAL, false).unwrap();
    host.set_policy_status(OWNER, FIREWALL, SELECTOR, false).unwrap();

    host.transact(OTHER, |host| consumer.deposit(host, OTHER, ether(1))).result.unwrap();
    assert_eq!(consumer.deposit_of(host.ledger(), OTHER), ether(1));
}

/// Dry-run mode records every verdict and lets the call through.
#[test]
fn test_dryrun_records_verdicts() {
    let (mut host, consumer) = setup();
    attach_both(&mut host);
    host.set_consumer_dryrun_status(ADMIN, CONSUMER, true).unwrap();
    assert!(host.firewall(FIREWALL).unwrap().is_dryrun(CONSUMER));

    let receipt = host.transact(OTHER, |host| consumer.deposit(host, OTHER, ether(1)));
    receipt.result.as_ref().unwrap();
    let kinds = receipt.events.iter().map(|event| (event.kind, event.policy)).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![
            (EventKind::DryrunPolicyPreError, GLOBAL),
            (EventKind::DryrunPolicyPreError, SELECTOR),
            (EventKind::DryrunPolicyPostSuccess, GLOBAL),
            (EventKind::DryrunPolicyPostSuccess, SELECTOR),
        ]
    );
    let error = receipt.events_of(EventKind::DryrunPolicyPreError).next().unwrap();
    assert_eq!(error.reason.as_deref(), Some("AllowlistPolicy: Sender not allowed"));
    assert_eq!((error.firewall, error.consumer), (FIREWALL, CONSUMER));

    let receipt = host.transact(USER, |host| consumer.deposit(host, USER, ether(1)));
    assert!(receipt.emitted(EventKind::DryrunPolicyPreSuccess));
    assert!(receipt.emitted(EventKind::DryrunPolicyPreError));

    host.set_consumer_dryrun_status(ADMIN, CONSUMER, false).unwrap();
    let receipt = host.transact(USER, |host| consumer.deposit(host, USER, ether(1)));
    assert_eq!(receipt.result, rejected_by(SELECTOR));
    assert!(receipt.events.is_empty());
}

/// A rejection in the post-execution hook is recorded in dry-run and reverts when enforcing.
#[test]
fn test_dryrun_records_post_rejections() {
    let (mut host, consumer) = setup();
    let mut forbidden = ForbiddenMethodsPolicy::new(FORBIDDEN, ADMIN);
    forbidden.set_consumer_forbidden_method(ADMIN, CONSUMER, DEPOSIT, true).unwrap();
    host.deploy_policy(forbidden).unwrap();
    host.set_policy_status(OWNER, FIREWALL, FORBIDDEN, true).unwrap();
    host.add_policy(ADMIN, CONSUMER, DEPOSIT, FORBIDDEN).unwrap();
    host.set_consumer_dryrun_status(ADMIN, CONSUMER, true).unwrap();

    let receipt = host.transact(USER, |host| consumer.deposit(host, USER, ether(1)));
    receipt.result.as_ref().unwrap();
    let kinds = receipt.events.iter().map(|event| (event.kind, event.policy)).collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![(EventKind::DryrunPolicyPreSuccess, FORBIDDEN), (EventKind::DryrunPolicyPostError, FORBIDDEN)]
    );
    let error = receipt.events_of(EventKind::DryrunPolicyPostError).next().unwrap();
    assert_eq!(error.reason.as_deref(), Some("ForbiddenMethodsPolicy: Forbidden method"));
    assert_eq!(consumer.deposit_of(host.ledger(), USER), ether(1));

    host.set_consumer_dryrun_status(ADMIN, CONSUMER, false).unwrap();
    let receipt = host.transact(USER, |host| consumer.deposit(host, USER, ether(1)));
    assert_eq!(
        receipt.result,
        Err(FirewallError::Policy { policy: FORBIDDEN, source: PolicyError::ForbiddenMethod })
    );
    assert_eq!(receipt.revert_reason().as_deref(), Some("ForbiddenMethodsPolicy: Forbidden method"));
    assert!(receipt.events.is_empty());
    assert_eq!(consumer.deposit_of(host.ledger(), USER), ether(1));
}

/// A reverted transaction drops its dry-run events with the rest of its effects.
#[test]
fn test_revert_drops_events() {
    let (mut host, consumer) = setup();
    attach_both(&mut host);
    host.set_consumer_dryrun_status(ADMIN, CONSUMER, true).unwrap();

    let receipt = host.transact(OTHER, |host| {
        consumer.deposit(host, OTHER, ether(1))?;
        assert_eq!(host.events().len(), 4);
        consumer.withdraw(host, OTHER, ether(2))
    });
    assert_eq!(receipt.revert_reason().as_deref(), Some("SampleConsumer: insufficient deposit"));
    assert!(receipt.events.is_empty());
    assert_eq!(host.ledger().native_balance(OTHER).unwrap(), ether(1000));
}

/// A consumer the firewall does not protect runs unguarded.
#[test]
fn test_unregistered_consumer_is_unprotected() {
    let (mut host, _) = setup();
    attach_both(&mut host);
    let stranger = SampleConsumer::new(address!("00000000000000000000000000000000000000c2"));
    host.transact(OTHER, |host| stranger.deposit(host, OTHER, ether(1))).result.unwrap();
}

#[test]
fn test_transaction_boundaries() {
    let (mut host, consumer) = setup();
    let message = Message::new(CONSUMER, USER, deposit_calldata()).with_value(ether(1));
    assert_eq!(host.call(message, |_| Ok(())), Err(FirewallError::NoActiveTransaction));
    assert_eq!(host.ledger().native_balance(USER).unwrap(), ether(1000));

    let receipt = host.transact(USER, |host| host.transact(USER, |_| Ok(())).result);
    assert_eq!(receipt.result, Err(FirewallError::TransactionActive));

    let before = host.block().number;
    host.transact(USER, |host| consumer.deposit(host, USER, ether(1))).result.unwrap();
    assert_eq!(host.block().number, before + 1);
}
