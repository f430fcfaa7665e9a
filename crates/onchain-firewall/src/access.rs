//! Role-based and single-owner access control for admin surfaces.

use alloy_primitives::{
    map::{HashMap, HashSet},
    Address, B256,
};
use tracing::debug;

use crate::{
    constants::roles::{DEFAULT_ADMIN_ROLE, POLICY_ADMIN_ROLE},
    AccessError,
};

/// Role membership table. Holders of [`DEFAULT_ADMIN_ROLE`] grant and revoke every role.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    members: HashMap<B256, HashSet<Address>>,
}

impl AccessControl {
    /// Creates a table where `admin` holds the default admin role.
    pub fn with_admin(admin: Address) -> Self {
        let mut access = Self::default();
        access.insert(DEFAULT_ADMIN_ROLE, admin);
        access
    }

    /// Creates a table where `admin` holds the default admin and policy admin roles.
    pub fn with_policy_admin(admin: Address) -> Self {
        let mut access = Self::with_admin(admin);
        access.insert(POLICY_ADMIN_ROLE, admin);
        access
    }

    /// Returns whether `account` holds `role`.
    pub fn has_role(&self, role: B256, account: Address) -> bool {
        self.members.get(&role).is_some_and(|members| members.contains(&account))
    }

    /// Fails with [`AccessError::MissingRole`] unless `account` holds `role`.
    pub fn check_role(&self, role: B256, account: Address) -> Result<(), AccessError> {
        if self.has_role(role, account) {
            Ok(())
        } else {
            Err(AccessError::MissingRole { account, role })
        }
    }

    /// Grants `role` to `account`. `caller` must hold the default admin role.
    pub fn grant_role(&mut self, caller: Address, role: B256, account: Address) -> Result<(), AccessError> {
        self.check_role(DEFAULT_ADMIN_ROLE, caller)?;
        if self.insert(role, account) {
            debug!(%role, %account, sender = %caller, "Role granted");
        }
        Ok(())
    }

    /// Revokes `role` from `account`. `caller` must hold the default admin role.
    pub fn revoke_role(&mut self, caller: Address, role: B256, account: Address) -> Result<(), AccessError> {
        self.check_role(DEFAULT_ADMIN_ROLE, caller)?;
        if self.members.get_mut(&role).is_some_and(|members| members.remove(&account)) {
            debug!(%role, %account, sender = %caller, "Role revoked");
        }
        Ok(())
    }

    /// Drops `role` for the caller itself.
    pub fn renounce_role(&mut self, caller: Address, role: B256) {
        if let Some(members) = self.members.get_mut(&role) {
            members.remove(&caller);
        }
    }

    fn insert(&mut self, role: B256, account: Address) -> bool {
        self.members.entry(role).or_default().insert(account)
    }
}

/// Single owner access control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownable {
    owner: Address,
}

impl Ownable {
    /// Creates an ownership record for `owner`.
    pub const fn new(owner: Address) -> Self {
        Self { owner }
    }

    /// Current owner.
    pub const fn owner(&self) -> Address {
        self.owner
    }

    /// Fails with [`AccessError::NotOwner`] unless `caller` is the owner.
    pub fn check_owner(&self, caller: Address) -> Result<(), AccessError> {
        if caller == self.owner {
            Ok(())
        } else {
            Err(AccessError::NotOwner)
        }
    }

    /// Hands ownership to `new_owner`.
    pub fn transfer_ownership(&mut self, caller: Address, new_owner: Address) -> Result<(), AccessError> {
        self.check_owner(caller)?;
        self.owner = new_owner;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::roles::SIGNER_ROLE;
    use alloy_primitives::address;

    const ADMIN: Address = address!("00000000000000000000000000000000000000a1");
    const OTHER: Address = address!("00000000000000000000000000000000000000b2");

    #[test]
    fn test_only_admin_grants_roles() {
        let mut access = AccessControl::with_admin(ADMIN);
        let err = access.grant_role(OTHER, SIGNER_ROLE, OTHER).unwrap_err();
        assert_eq!(
            err.to_string(),
            "AccessControl: account 0x00000000000000000000000000000000000000b2 is missing role \
             0x0000000000000000000000000000000000000000000000000000000000000000"
        );

        access.grant_role(ADMIN, SIGNER_ROLE, OTHER).unwrap();
        assert!(access.has_role(SIGNER_ROLE, OTHER));
        access.revoke_role(ADMIN, SIGNER_ROLE, OTHER).unwrap();
        assert!(!access.has_role(SIGNER_ROLE, OTHER));
    }

    #[test]
    fn test_policy_admin_holds_both_admin_roles() {
        let mut access = AccessControl::with_policy_admin(ADMIN);
        assert!(access.has_role(DEFAULT_ADMIN_ROLE, ADMIN));
        assert!(access.has_role(POLICY_ADMIN_ROLE, ADMIN));
        assert!(!access.has_role(POLICY_ADMIN_ROLE, OTHER));

        access.grant_role(ADMIN, POLICY_ADMIN_ROLE, OTHER).unwrap();
        assert!(access.has_role(POLICY_ADMIN_ROLE, OTHER));
    }

    #[test]
    fn test_ownership_transfer() {
        let mut ownable = Ownable::new(ADMIN);
        assert_eq!(ownable.transfer_ownership(OTHER, OTHER), Err(AccessError::NotOwner));
        ownable.transfer_ownership(ADMIN, OTHER).unwrap();
        assert_eq!(ownable.owner(), OTHER);
        assert_eq!(AccessError::NotOwner.to_string(), "Ownable: caller is not the owner");
    }
}
