//! Tests for consumer-side firewall settings.

use alloy_primitives::{address, Address};
use onchain_firewall::{
    policy::AllowlistPolicy,
    test_utils::{ether, new_host, SampleConsumer, ADMIN, CONSUMER, FIREWALL, OTHER, OWNER, USER},
    AccessError, FirewallError, FirewallHost, MemoryLedger, PolicyError,
};

const POLICY: Address = address!("00000000000000000000000000000000000a0c0c");
const SECOND_FIREWALL: Address = address!("00000000000000000000000000000000000000f2");

/// [`CONSUMER`] admits only [`USER`].
fn setup() -> (FirewallHost<MemoryLedger>, SampleConsumer) {
    let mut host = new_host();
    let mut policy = AllowlistPolicy::new(POLICY, ADMIN);
    policy.set_consumer_allowlist(ADMIN, CONSUMER, &[USER], true).unwrap();
    host.deploy_policy(policy).unwrap();
    host.set_policy_status(OWNER, FIREWALL, POLICY, true).unwrap();
    host.add_global_policy(ADMIN, CONSUMER, POLICY).unwrap();
    (host, SampleConsumer::new(CONSUMER))
}

fn deposit_as_other(host: &mut FirewallHost<MemoryLedger>, consumer: SampleConsumer) -> Result<(), FirewallError> {
    host.transact(OTHER, |host| consumer.deposit(host, OTHER, ether(1))).result
}

/// The zero firewall switches protection off.
#[test]
fn test_zero_firewall_disables_protection() {
    let (mut host, consumer) = setup();
    assert_eq!(
        deposit_as_other(&mut host, consumer),
        Err(FirewallError::Policy { policy: POLICY, source: PolicyError::SenderNotAllowed })
    );

    host.consumers_mut().set_firewall(ADMIN, CONSUMER, Address::ZERO).unwrap();
    deposit_as_other(&mut host, consumer).unwrap();
    assert_eq!(host.add_global_policy(ADMIN, CONSUMER, POLICY), Err(FirewallError::UnknownFirewall(Address::ZERO)));
}

/// Moving a consumer to another firewall leaves the old policy activations behind.
#[test]
fn test_move_to_another_firewall() {
    let (mut host, consumer) = setup();
    host.deploy_firewall(SECOND_FIREWALL, OWNER).unwrap();
    assert_eq!(host.deploy_firewall(SECOND_FIREWALL, OWNER), Err(FirewallError::FirewallExists(SECOND_FIREWALL)));

    assert_eq!(
        host.consumers_mut().set_firewall(USER, CONSUMER, SECOND_FIREWALL),
        Err(FirewallError::Access(AccessError::NotFirewallAdmin))
    );
    host.consumers_mut().set_firewall(ADMIN, CONSUMER, SECOND_FIREWALL).unwrap();
    assert_eq!(host.consumers().get(CONSUMER).unwrap().firewall(), SECOND_FIREWALL);
    deposit_as_other(&mut host, consumer).unwrap();

    assert_eq!(host.add_global_policy(ADMIN, CONSUMER, POLICY), Err(FirewallError::PolicyNotApproved));
    host.set_policy_status(OWNER, SECOND_FIREWALL, POLICY, true).unwrap();
    host.add_global_policy(ADMIN, CONSUMER, POLICY).unwrap();
    assert!(deposit_as_other(&mut host, consumer).is_err());
}

/// A firewall admin transfer only takes effect once the nominee accepts.
#[test]
fn test_two_step_admin_transfer() {
    let (mut host, _) = setup();
    host.consumers_mut().set_firewall_admin(ADMIN, CONSUMER, OTHER).unwrap();
    assert_eq!(host.consumers().get(CONSUMER).unwrap().pending_admin(), Some(OTHER));
    assert_eq!(
        host.remove_global_policy(OTHER, CONSUMER, POLICY),
        Err(FirewallError::Access(AccessError::NotConsumerAdmin))
    );

    assert_eq!(
        host.consumers_mut().accept_firewall_admin(USER, CONSUMER),
        Err(FirewallError::Access(AccessError::NotPendingFirewallAdmin))
    );
    host.consumers_mut().accept_firewall_admin(OTHER, CONSUMER).unwrap();
    assert_eq!(host.consumers().get(CONSUMER).unwrap().admin(), OTHER);

    assert_eq!(
        host.remove_global_policy(ADMIN, CONSUMER, POLICY),
        Err(FirewallError::Access(AccessError::NotConsumerAdmin))
    );
    host.remove_global_policy(OTHER, CONSUMER, POLICY).unwrap();
}

#[test]
fn test_register_twice() {
    let (mut host, _) = setup();
    assert_eq!(host.register_consumer(CONSUMER, FIREWALL, ADMIN), Err(FirewallError::ConsumerExists(CONSUMER)));
    assert_eq!(
        host.consumers_mut().set_approved_venn_policy(USER, CONSUMER, POLICY, true),
        Err(FirewallError::Access(AccessError::NotFirewallAdmin))
    );
}
