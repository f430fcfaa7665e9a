//! Off-chain approval bundles and their signatures.
//!
//! A signer approves a list of call hashes for one transaction origin by signing the EIP-191
//! personal-message hash of the bundle digest:
//!
//! ```text
//! digest = keccak256(encodePacked(bytes32[] callHashes, uint256 expiration, address origin,
//!                                 uint256 nonce, address policy, uint256 chainId))
//! signed = keccak256("\x19Ethereum Signed Message:\n32" ‖ digest)
//! ```

use alloy_primitives::{eip191_hash_message, keccak256, Address, Bytes, B256, U256};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::BlockEnv;

/// Length of an `r ‖ s ‖ v` signature.
pub const SIGNATURE_LENGTH: usize = 65;

/// Why an approval bundle was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BundleError {
    /// The bundle was issued for another chain.
    #[error("bundle chain id {bundle} does not match chain id {chain}")]
    ChainMismatch {
        /// Chain id in the bundle.
        bundle: u64,
        /// Chain id of the executing block.
        chain: u64,
    },
    /// The bundle was issued for another policy instance.
    #[error("bundle issued for policy {bundle}, not {policy}")]
    PolicyMismatch {
        /// Policy address in the bundle.
        bundle: Address,
        /// Address of the verifying policy.
        policy: Address,
    },
    /// The bundle expired.
    #[error("bundle expired at {expiration}, block time is {now}")]
    Expired {
        /// Expiration in the bundle.
        expiration: U256,
        /// Current block timestamp.
        now: u64,
    },
    /// The signature is malformed or does not recover.
    #[error("invalid signature")]
    InvalidSignature,
}

/// Call hashes approved for one origin, as signed off-chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalBundle {
    /// Approved call hashes; the last one is consumed first.
    pub call_hashes: Vec<B256>,
    /// Last block timestamp at which the bundle may be used.
    pub expiration: U256,
    /// Transaction origin the approval is bound to.
    pub origin: Address,
    /// Origin nonce the bundle consumes.
    pub nonce: U256,
    /// Policy instance the bundle is bound to.
    pub policy: Address,
    /// Chain the bundle is bound to.
    pub chain_id: u64,
}

impl ApprovalBundle {
    /// Packed encoding of the bundle. The call hash array contributes its elements only.
    pub fn packed(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.call_hashes.len() * 32 + 32 * 3 + 20 * 2);
        for hash in &self.call_hashes {
            buf.extend_from_slice(hash.as_slice());
        }
        buf.extend_from_slice(&self.expiration.to_be_bytes::<32>());
        buf.extend_from_slice(self.origin.as_slice());
        buf.extend_from_slice(&self.nonce.to_be_bytes::<32>());
        buf.extend_from_slice(self.policy.as_slice());
        buf.extend_from_slice(&U256::from(self.chain_id).to_be_bytes::<32>());
        buf
    }

    /// `keccak256` of the packed encoding.
    pub fn digest(&self) -> B256 {
        keccak256(self.packed())
    }

    /// EIP-191 personal-message hash of the digest; this is what gets signed.
    pub fn signing_hash(&self) -> B256 {
        eip191_hash_message(self.digest())
    }

    /// Signs the bundle with `key`.
    pub fn sign(&self, key: &SigningKey) -> Result<Bytes, BundleError> {
        sign_prehash(key, self.signing_hash())
    }

    /// Recovers the address that signed the bundle.
    pub fn recover_signer(&self, signature: &[u8]) -> Result<Address, BundleError> {
        recover_signer(self.signing_hash(), signature)
    }
}

/// Checks the bundle's bindings and expiry against the verifying `policy` and `block`, then
/// recovers its signer.
///
/// Role membership and nonce ordering are left to the caller.
pub fn verify_bundle(
    bundle: &ApprovalBundle,
    signature: &[u8],
    policy: Address,
    block: &BlockEnv,
) -> Result<Address, BundleError> {
    if bundle.chain_id != block.chain_id {
        return Err(BundleError::ChainMismatch { bundle: bundle.chain_id, chain: block.chain_id });
    }
    if bundle.policy != policy {
        return Err(BundleError::PolicyMismatch { bundle: bundle.policy, policy });
    }
    if U256::from(block.timestamp) > bundle.expiration {
        return Err(BundleError::Expired { expiration: bundle.expiration, now: block.timestamp });
    }
    bundle.recover_signer(signature)
}

/// Produces an `r ‖ s ‖ v` signature over `hash` with `v ∈ {27, 28}`.
pub fn sign_prehash(key: &SigningKey, hash: B256) -> Result<Bytes, BundleError> {
    let (signature, recovery_id) =
        key.sign_prehash_recoverable(hash.as_slice()).map_err(|_| BundleError::InvalidSignature)?;
    let mut bytes = Vec::with_capacity(SIGNATURE_LENGTH);
    bytes.extend_from_slice(&signature.to_bytes());
    bytes.push(27 + recovery_id.to_byte());
    Ok(bytes.into())
}

/// Recovers the signer of `hash` from an `r ‖ s ‖ v` signature. `v` may be 0/1 or 27/28.
pub fn recover_signer(hash: B256, signature: &[u8]) -> Result<Address, BundleError> {
    if signature.len() != SIGNATURE_LENGTH {
        return Err(BundleError::InvalidSignature);
    }

    let v = match signature[64] {
        v @ (27 | 28) => v - 27,
        v @ (0 | 1) => v,
        _ => return Err(BundleError::InvalidSignature),
    };
    let recovery_id = RecoveryId::try_from(v).map_err(|_| BundleError::InvalidSignature)?;
    let signature = Signature::from_slice(&signature[..64]).map_err(|_| BundleError::InvalidSignature)?;

    let recovered_key = VerifyingKey::recover_from_prehash(hash.as_slice(), &signature, recovery_id)
        .map_err(|_| BundleError::InvalidSignature)?;
    Ok(public_key_address(&recovered_key))
}

/// Ethereum address of a public key: the last 20 bytes of the hash of its uncompressed point
/// without the `0x04` prefix.
pub fn public_key_address(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, b256};

    // Well-known development key.
    const KEY: B256 = b256!("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80");
    const KEY_ADDRESS: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
    const POLICY: Address = address!("0000000000000000000000000000000000000f01");
    const ORIGIN: Address = address!("0000000000000000000000000000000000000a01");

    fn bundle() -> ApprovalBundle {
        ApprovalBundle {
            call_hashes: vec![B256::repeat_byte(1), B256::repeat_byte(2)],
            expiration: U256::from(1_000u64),
            origin: ORIGIN,
            nonce: U256::ZERO,
            policy: POLICY,
            chain_id: 31337,
        }
    }

    #[test]
    fn test_packed_layout() {
        let bundle = bundle();
        let packed = bundle.packed();
        assert_eq!(packed.len(), 2 * 32 + 32 + 20 + 32 + 20 + 32);
        assert_eq!(&packed[..32], B256::repeat_byte(1).as_slice());
        assert_eq!(&packed[96..116], ORIGIN.as_slice());
        assert_eq!(&packed[148..168], POLICY.as_slice());
        assert_eq!(U256::from_be_slice(&packed[168..]), U256::from(31337));
    }

    #[test]
    fn test_sign_and_recover() {
        let key = SigningKey::from_slice(KEY.as_slice()).unwrap();
        assert_eq!(public_key_address(key.verifying_key()), KEY_ADDRESS);

        let bundle = bundle();
        let signature = bundle.sign(&key).unwrap();
        assert_eq!(signature.len(), SIGNATURE_LENGTH);
        assert!(matches!(signature[64], 27 | 28));
        assert_eq!(bundle.recover_signer(&signature).unwrap(), KEY_ADDRESS);

        // The same signature with a 0/1 recovery byte.
        let mut raw = signature.to_vec();
        raw[64] -= 27;
        assert_eq!(bundle.recover_signer(&raw).unwrap(), KEY_ADDRESS);

        raw[64] = 5;
        assert_eq!(bundle.recover_signer(&raw), Err(BundleError::InvalidSignature));
        assert_eq!(bundle.recover_signer(&raw[..64]), Err(BundleError::InvalidSignature));
    }

    #[test]
    fn test_verify_bundle_bindings() {
        let key = SigningKey::from_slice(KEY.as_slice()).unwrap();
        let bundle = bundle();
        let signature = bundle.sign(&key).unwrap();
        let block = BlockEnv::new(31337).with_timestamp(1_000);

        assert_eq!(verify_bundle(&bundle, &signature, POLICY, &block), Ok(KEY_ADDRESS));
        assert!(matches!(
            verify_bundle(&bundle, &signature, POLICY, &BlockEnv::new(1)),
            Err(BundleError::ChainMismatch { bundle: 31337, chain: 1 })
        ));
        assert!(matches!(
            verify_bundle(&bundle, &signature, ORIGIN, &block),
            Err(BundleError::PolicyMismatch { .. })
        ));
        assert!(matches!(
            verify_bundle(&bundle, &signature, POLICY, &block.with_timestamp(1_001)),
            Err(BundleError::Expired { now: 1_001, .. })
        ));

        // Any change to the bundle changes the recovered signer.
        let tampered = ApprovalBundle { nonce: U256::from(1), ..bundle };
        assert_ne!(verify_bundle(&tampered, &signature, POLICY, &block), Ok(KEY_ADDRESS));
    }
}
