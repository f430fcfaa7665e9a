//! Declarative description of a firewall deployment.
//!
//! A [`HostConfig`] lists firewalls, policies with their settings and consumers with the policies
//! they attach. [`FirewallHost::from_config`] applies it through the regular admin surface, so a
//! configuration is subject to the same role checks as individual admin calls.

use alloy_primitives::{Address, Selector, B256, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    constants::roles::{APPROVER_ROLE, SIGNER_ROLE},
    policy::{
        AdminCallPolicy, AllowlistPolicy, ApprovedCallsPolicy, ApprovedVectorsPolicy, BalanceChangePolicy,
        CombinedPoliciesPolicy, ForbiddenMethodsPolicy, InvariantRule, NonReentrantPolicy, OnlyEoaPolicy,
        PrivateInvariantsPolicy,
    },
    BlockEnv, FirewallError, FirewallHost, LedgerMut, PolicyError,
};

/// Errors applying a [`HostConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A policy setting was rejected.
    #[error("policy {policy}: {source}")]
    Policy {
        /// Policy being configured.
        policy: Address,
        /// Rejection.
        #[source]
        source: PolicyError,
    },
    /// A policy was deployed but cannot be found under its declared kind.
    #[error("policy {0} is not deployed as declared")]
    Missing(Address),
    /// A firewall or consumer setting was rejected.
    #[error(transparent)]
    Firewall(#[from] FirewallError),
}

/// A whole deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HostConfig {
    /// Starting block.
    #[serde(default)]
    pub block: BlockEnv,
    /// Seconds each mined block advances the clock by.
    #[serde(default)]
    pub block_time: Option<u64>,
    /// Firewalls to deploy.
    #[serde(default)]
    pub firewalls: Vec<FirewallConfig>,
    /// Policies to deploy, in order.
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
    /// Consumers to register.
    #[serde(default)]
    pub consumers: Vec<ConsumerConfig>,
}

/// A firewall instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallConfig {
    /// Address of the firewall.
    pub address: Address,
    /// Owner, who approves policies.
    pub owner: Address,
}

/// Executors and consumers of a gated policy, beyond the firewall it was deployed for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyGating {
    /// Additional authorized executors, such as a combining policy.
    #[serde(default)]
    pub executors: Vec<Address>,
    /// Approved consumers.
    #[serde(default)]
    pub consumers: Vec<Address>,
}

/// Balance limit of a consumer in one token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceLimit {
    /// Limited consumer.
    pub consumer: Address,
    /// Token, or the native token marker.
    pub token: Address,
    /// Largest allowed absolute change per call.
    pub max: U256,
}

/// Selectors forbidden on a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForbiddenConfig {
    /// Consumer.
    pub consumer: Address,
    /// Forbidden selectors.
    pub selectors: Vec<Selector>,
}

/// Accounts allowed to call a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowlistConfig {
    /// Consumer.
    pub consumer: Address,
    /// Allowed senders.
    pub accounts: Vec<Address>,
}

/// Slots and rules checked around one selector of a consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvariantConfig {
    /// Consumer.
    pub consumer: Address,
    /// Protected selector.
    pub selector: Selector,
    /// Slots to snapshot.
    pub slots: Vec<B256>,
    /// Rules over the snapshots.
    #[serde(default)]
    pub rules: Vec<InvariantRule>,
}

/// A policy to deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PolicyConfig {
    /// [`ApprovedCallsPolicy`].
    #[serde(rename_all = "camelCase")]
    ApprovedCalls {
        /// Policy address.
        address: Address,
        /// Firewall executing the policy.
        firewall: Address,
        /// Holder of the admin roles.
        admin: Address,
        /// Holders of the signer role.
        #[serde(default)]
        signers: Vec<Address>,
        /// Executors and consumers.
        #[serde(flatten)]
        gating: PolicyGating,
    },
    /// [`AdminCallPolicy`].
    #[serde(rename_all = "camelCase")]
    AdminCall {
        /// Policy address.
        address: Address,
        /// Firewall executing the policy.
        firewall: Address,
        /// Holder of the admin roles.
        admin: Address,
        /// Holders of the approver role.
        #[serde(default)]
        approvers: Vec<Address>,
        /// Approval lifetime in seconds.
        #[serde(default)]
        expiration_time: Option<u64>,
        /// Executors and consumers.
        #[serde(flatten)]
        gating: PolicyGating,
    },
    /// [`ApprovedVectorsPolicy`].
    #[serde(rename_all = "camelCase")]
    ApprovedVectors {
        /// Policy address.
        address: Address,
        /// Firewall executing the policy.
        firewall: Address,
        /// Holder of the admin roles.
        admin: Address,
        /// Approved selector sequences; every prefix is approved too.
        #[serde(default)]
        sequences: Vec<Vec<Selector>>,
        /// Executors and consumers.
        #[serde(flatten)]
        gating: PolicyGating,
    },
    /// [`BalanceChangePolicy`].
    #[serde(rename_all = "camelCase")]
    BalanceChange {
        /// Policy address.
        address: Address,
        /// Firewall executing the policy.
        firewall: Address,
        /// Holder of the admin roles.
        admin: Address,
        /// Per-consumer token limits.
        #[serde(default)]
        limits: Vec<BalanceLimit>,
        /// Executors and consumers.
        #[serde(flatten)]
        gating: PolicyGating,
    },
    /// [`CombinedPoliciesPolicy`].
    #[serde(rename_all = "camelCase")]
    Combined {
        /// Policy address.
        address: Address,
        /// Firewall executing the policy.
        firewall: Address,
        /// Holder of the admin roles.
        admin: Address,
        /// Member policies, in evaluation order.
        members: Vec<Address>,
        /// Allowed verdict rows.
        allowed: Vec<Vec<bool>>,
        /// Executors and consumers.
        #[serde(flatten)]
        gating: PolicyGating,
    },
    /// [`ForbiddenMethodsPolicy`].
    #[serde(rename_all = "camelCase")]
    ForbiddenMethods {
        /// Policy address.
        address: Address,
        /// Holder of the admin roles.
        admin: Address,
        /// Forbidden selectors per consumer.
        #[serde(default)]
        forbidden: Vec<ForbiddenConfig>,
    },
    /// [`AllowlistPolicy`].
    #[serde(rename_all = "camelCase")]
    Allowlist {
        /// Policy address.
        address: Address,
        /// Holder of the admin roles.
        admin: Address,
        /// Allowed senders per consumer.
        #[serde(default)]
        allowlist: Vec<AllowlistConfig>,
    },
    /// [`PrivateInvariantsPolicy`].
    #[serde(rename_all = "camelCase")]
    PrivateInvariants {
        /// Policy address.
        address: Address,
        /// Owner of the policy.
        owner: Address,
        /// Registered slots and rules.
        #[serde(default)]
        invariants: Vec<InvariantConfig>,
    },
    /// [`NonReentrantPolicy`].
    NonReentrant {
        /// Policy address.
        address: Address,
    },
    /// [`OnlyEoaPolicy`].
    #[serde(rename = "onlyEOA")]
    OnlyEoa {
        /// Policy address.
        address: Address,
    },
}

impl PolicyConfig {
    /// Address the policy is deployed at.
    pub const fn address(&self) -> Address {
        match self {
            Self::ApprovedCalls { address, .. }
            | Self::AdminCall { address, .. }
            | Self::ApprovedVectors { address, .. }
            | Self::BalanceChange { address, .. }
            | Self::Combined { address, .. }
            | Self::ForbiddenMethods { address, .. }
            | Self::Allowlist { address, .. }
            | Self::PrivateInvariants { address, .. }
            | Self::NonReentrant { address }
            | Self::OnlyEoa { address } => *address,
        }
    }
}

/// Policies attached to one selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorPolicies {
    /// Protected selector.
    pub selector: Selector,
    /// Policies, in evaluation order.
    pub policies: Vec<Address>,
}

/// A protected contract and its firewall settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerConfig {
    /// Address of the consumer.
    pub address: Address,
    /// Protecting firewall; zero leaves the consumer unprotected.
    pub firewall: Address,
    /// Firewall admin of the consumer.
    pub admin: Address,
    /// Whether the consumer starts in dry-run mode.
    #[serde(default)]
    pub dryrun: bool,
    /// Policies applying to every selector.
    #[serde(default)]
    pub global_policies: Vec<Address>,
    /// Per-selector policies.
    #[serde(default)]
    pub policies: Vec<SelectorPolicies>,
    /// Private invariant policy per selector.
    #[serde(default)]
    pub invariant_policies: Vec<InvariantAttachment>,
    /// Policies usable through safe function calls.
    #[serde(default)]
    pub venn_policies: Vec<Address>,
}

/// Private invariant policy of one selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvariantAttachment {
    /// Protected selector.
    pub selector: Selector,
    /// Invariant policy.
    pub policy: Address,
}

impl<L: LedgerMut + Clone> FirewallHost<L> {
    /// Builds a host over `ledger` from `config`.
    ///
    /// Policies attached by a consumer are approved on its firewall by the firewall owner.
    pub fn from_config(config: HostConfig, ledger: L) -> Result<Self, ConfigError> {
        let mut host = Self::new(ledger, config.block);
        if let Some(block_time) = config.block_time {
            host = host.with_block_time(block_time);
        }

        for firewall in &config.firewalls {
            host.deploy_firewall(firewall.address, firewall.owner)?;
        }
        for policy in config.policies {
            host.apply_policy(policy)?;
        }
        for consumer in &config.consumers {
            host.apply_consumer(consumer)?;
        }

        info!(
            firewalls = config.firewalls.len(),
            consumers = config.consumers.len(),
            "Deployment configured"
        );
        Ok(host)
    }

    fn apply_policy(&mut self, config: PolicyConfig) -> Result<(), ConfigError> {
        let address = config.address();
        let rejected = |source: PolicyError| ConfigError::Policy { policy: address, source };
        debug!(policy = %address, "Configuring policy");

        match config {
            PolicyConfig::ApprovedCalls { firewall, admin, signers, gating, .. } => {
                self.deploy_policy(ApprovedCallsPolicy::new(address, firewall, admin))?;
                let base = self.policy_base_mut(address).ok_or(ConfigError::Missing(address))?;
                for signer in signers {
                    base.grant_role(admin, SIGNER_ROLE, signer).map_err(|err| rejected(err.into()))?;
                }
                self.apply_gating(address, admin, gating)?;
            }
            PolicyConfig::AdminCall { firewall, admin, approvers, expiration_time, gating, .. } => {
                self.deploy_policy(AdminCallPolicy::new(address, firewall, admin))?;
                let base = self.policy_base_mut(address).ok_or(ConfigError::Missing(address))?;
                for approver in &approvers {
                    base.grant_role(admin, APPROVER_ROLE, *approver).map_err(|err| rejected(err.into()))?;
                }
                if let Some(expiration_time) = expiration_time {
                    // The expiration setter is approver-gated.
                    let caller = approvers.first().copied().unwrap_or(admin);
                    self.policy_mut::<AdminCallPolicy>(address)
                        .ok_or(ConfigError::Missing(address))?
                        .set_expiration_time(caller, expiration_time)
                        .map_err(rejected)?;
                }
                self.apply_gating(address, admin, gating)?;
            }
            PolicyConfig::ApprovedVectors { firewall, admin, sequences, gating, .. } => {
                let mut policy = ApprovedVectorsPolicy::new(address, firewall, admin);
                for sequence in &sequences {
                    policy.approve_sequence(admin, sequence).map_err(rejected)?;
                }
                self.deploy_policy(policy)?;
                self.apply_gating(address, admin, gating)?;
            }
            PolicyConfig::BalanceChange { firewall, admin, limits, gating, .. } => {
                let mut policy = BalanceChangePolicy::new(address, firewall, admin);
                for limit in limits {
                    policy
                        .set_consumer_max_balance_change(admin, limit.consumer, limit.token, limit.max)
                        .map_err(rejected)?;
                }
                self.deploy_policy(policy)?;
                self.apply_gating(address, admin, gating)?;
            }
            PolicyConfig::Combined { firewall, admin, members, allowed, gating, .. } => {
                let mut policy = CombinedPoliciesPolicy::new(address, firewall, admin);
                policy.set_allowed_combinations(admin, members, allowed).map_err(rejected)?;
                self.deploy_policy(policy)?;
                self.apply_gating(address, admin, gating)?;
            }
            PolicyConfig::ForbiddenMethods { admin, forbidden, .. } => {
                let mut policy = ForbiddenMethodsPolicy::new(address, admin);
                for entry in forbidden {
                    for selector in entry.selectors {
                        policy.set_consumer_forbidden_method(admin, entry.consumer, selector, true).map_err(rejected)?;
                    }
                }
                self.deploy_policy(policy)?;
            }
            PolicyConfig::Allowlist { admin, allowlist, .. } => {
                let mut policy = AllowlistPolicy::new(address, admin);
                for entry in allowlist {
                    policy.set_consumer_allowlist(admin, entry.consumer, &entry.accounts, true).map_err(rejected)?;
                }
                self.deploy_policy(policy)?;
            }
            PolicyConfig::PrivateInvariants { owner, invariants, .. } => {
                let mut policy = PrivateInvariantsPolicy::new(address, owner);
                for entry in invariants {
                    policy
                        .set_sighash_invariant_storage_slots(owner, entry.consumer, entry.selector, entry.slots)
                        .map_err(rejected)?;
                    policy
                        .set_sighash_invariant_rules(owner, entry.consumer, entry.selector, entry.rules)
                        .map_err(rejected)?;
                }
                self.deploy_invariant_policy(policy)?;
            }
            PolicyConfig::NonReentrant { .. } => {
                self.deploy_policy(NonReentrantPolicy::new(address))?;
            }
            PolicyConfig::OnlyEoa { .. } => {
                self.deploy_policy(OnlyEoaPolicy::new(address))?;
            }
        }
        Ok(())
    }

    fn apply_gating(&mut self, address: Address, admin: Address, gating: PolicyGating) -> Result<(), ConfigError> {
        let rejected = |source: PolicyError| ConfigError::Policy { policy: address, source };
        let base = self.policy_base_mut(address).ok_or(ConfigError::Missing(address))?;
        for executor in gating.executors {
            base.set_executor_status(admin, executor, true).map_err(rejected)?;
        }
        if !gating.consumers.is_empty() {
            let statuses = vec![true; gating.consumers.len()];
            base.set_consumers_statuses(admin, &gating.consumers, &statuses).map_err(rejected)?;
        }
        Ok(())
    }

    fn apply_consumer(&mut self, config: &ConsumerConfig) -> Result<(), ConfigError> {
        let (consumer, admin) = (config.address, config.admin);
        self.register_consumer(consumer, config.firewall, admin)?;
        for policy in &config.venn_policies {
            self.consumers_mut().set_approved_venn_policy(admin, consumer, *policy, true)?;
        }
        if config.firewall.is_zero() {
            return Ok(());
        }
        let owner = self.firewall(config.firewall).ok_or(FirewallError::UnknownFirewall(config.firewall))?.owner();

        let attached = config
            .global_policies
            .iter()
            .chain(config.policies.iter().flat_map(|entry| &entry.policies))
            .chain(config.invariant_policies.iter().map(|entry| &entry.policy));
        for policy in attached {
            self.set_policy_status(owner, config.firewall, *policy, true)?;
        }

        for policy in &config.global_policies {
            self.add_global_policy(admin, consumer, *policy)?;
        }
        for entry in &config.policies {
            for policy in &entry.policies {
                self.add_policy(admin, consumer, entry.selector, *policy)?;
            }
        }
        if !config.invariant_policies.is_empty() {
            let (selectors, policies): (Vec<_>, Vec<_>) =
                config.invariant_policies.iter().map(|entry| (entry.selector, entry.policy)).unzip();
            self.set_private_invariants_policy(admin, consumer, &selectors, &policies)?;
        }
        if config.dryrun {
            self.set_consumer_dryrun_status(admin, consumer, true)?;
        }
        Ok(())
    }
}
