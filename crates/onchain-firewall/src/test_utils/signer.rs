use alloy_primitives::{address, b256, Address, Bytes, B256};
use k256::ecdsa::SigningKey;

use crate::ApprovalBundle;

/// Secret key of [`SIGNER`].
pub const SIGNER_KEY: B256 = b256!("ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80");
/// Account holding the signer role in tests.
pub const SIGNER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

/// Secret key of [`IMPOSTOR`].
pub const IMPOSTOR_KEY: B256 = b256!("59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d");
/// Account without any role.
pub const IMPOSTOR: Address = address!("70997970C51812dc3A010C7d01b50e0d17dc79C8");

/// Signing key for a secret.
pub fn signing_key(secret: B256) -> SigningKey {
    SigningKey::from_slice(secret.as_slice()).unwrap()
}

/// Signs `bundle` with `secret`.
pub fn sign_bundle(secret: B256, bundle: &ApprovalBundle) -> Bytes {
    bundle.sign(&signing_key(secret)).unwrap()
}
