//! Constants shared by the firewall, its policies and their off-chain counterparts.

use alloy_primitives::{address, Address};

/// Sentinel address standing for the chain's native asset in token lists.
pub const NATIVE_TOKEN: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Default validity window of an admin-approved call, in seconds.
pub const DEFAULT_ADMIN_CALL_EXPIRATION: u64 = 24 * 60 * 60;

/// Seconds a block advances when the host mines a new one for a transaction.
pub const DEFAULT_BLOCK_TIME: u64 = 1;

/// Role identifiers, computed as `keccak256(<role name>)` except for the default admin role.
pub mod roles {
    use alloy_primitives::{b256, B256};

    /// Administers every other role.
    pub const DEFAULT_ADMIN_ROLE: B256 = B256::ZERO;

    /// `keccak256("SIGNER_ROLE")`. May approve call bundles, directly or by signature.
    pub const SIGNER_ROLE: B256 =
        b256!("e2f4eaae4a9751e85a3e4a7b9587827a877f29914755229b07a7b2da98285f70");

    /// `keccak256("POLICY_ADMIN_ROLE")`. May change a policy's configuration.
    pub const POLICY_ADMIN_ROLE: B256 =
        b256!("ace7350211ab645c1937904136ede4855ac3aa1eabb4970e1a51a335d2e19920");

    /// `keccak256("APPROVER_ROLE")`. May approve individual admin calls.
    pub const APPROVER_ROLE: B256 =
        b256!("408a36151f841709116a4e8aca4e0202874f7f54687dcb863b1ea4672dc9d8cf");
}

#[cfg(test)]
mod tests {
    use super::roles::*;
    use alloy_primitives::keccak256;

    #[test]
    fn test_role_ids_match_their_names() {
        assert_eq!(SIGNER_ROLE, keccak256("SIGNER_ROLE"));
        assert_eq!(POLICY_ADMIN_ROLE, keccak256("POLICY_ADMIN_ROLE"));
        assert_eq!(APPROVER_ROLE, keccak256("APPROVER_ROLE"));
    }
}
