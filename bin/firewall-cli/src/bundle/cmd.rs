use std::path::PathBuf;

use alloy_primitives::{Address, Bytes, B256, U256};
use clap::Parser;
use k256::ecdsa::SigningKey;
use onchain_firewall::{public_key_address, ApprovalBundle};
use serde::Serialize;
use tracing::debug;

use crate::common::{parse_hex, write_json, CliError, Result};

/// Build, sign or verify an approval bundle
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Approved call hashes, in approval order. The last one is consumed first
    #[arg(long = "call-hash", value_name = "HASH", required = true)]
    pub call_hashes: Vec<B256>,

    /// Last block timestamp at which the bundle may be used
    #[arg(long = "expiration")]
    pub expiration: U256,

    /// Transaction origin the approval is bound to
    #[arg(long = "origin")]
    pub origin: Address,

    /// Origin nonce the bundle consumes
    #[arg(long = "nonce", default_value = "0")]
    pub nonce: U256,

    /// Approved calls policy the bundle is bound to
    #[arg(long = "policy")]
    pub policy: Address,

    /// Chain the bundle is bound to
    #[arg(long = "chain-id", default_value = "1")]
    pub chain_id: u64,

    /// Private key of a signer. If given, the bundle is signed
    #[arg(long = "private-key", env = "FWCTL_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<B256>,

    /// Existing signature to recover the signer from
    #[arg(long = "signature", conflicts_with = "private_key", value_parser = parse_hex)]
    pub signature: Option<Bytes>,

    /// Output file (if not specified, prints to console)
    #[arg(long = "output", short = 'o')]
    pub output: Option<PathBuf>,
}

/// A bundle with its hashes and, if available, its signature and signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleOutput {
    /// The bundle.
    pub bundle: ApprovalBundle,
    /// Hash of the packed bundle.
    pub digest: B256,
    /// EIP-191 hash that is signed.
    pub signing_hash: B256,
    /// Signature over the signing hash.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<Bytes>,
    /// Address that produced the signature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer: Option<Address>,
}

impl Cmd {
    /// The bundle described by the arguments.
    pub fn bundle(&self) -> ApprovalBundle {
        ApprovalBundle {
            call_hashes: self.call_hashes.clone(),
            expiration: self.expiration,
            origin: self.origin,
            nonce: self.nonce,
            policy: self.policy,
            chain_id: self.chain_id,
        }
    }

    /// Builds the bundle and signs it or recovers its signer.
    pub fn execute(&self) -> Result<BundleOutput> {
        let bundle = self.bundle();
        let (signature, signer) = if let Some(key) = self.private_key {
            let key = SigningKey::from_slice(key.as_slice()).map_err(|e| CliError::InvalidKey(e.to_string()))?;
            let signature = bundle.sign(&key)?;
            (Some(signature), Some(public_key_address(key.verifying_key())))
        } else if let Some(signature) = &self.signature {
            let signer = bundle.recover_signer(signature)?;
            (Some(signature.clone()), Some(signer))
        } else {
            (None, None)
        };
        debug!(digest = %bundle.digest(), ?signer, "Bundle built");

        Ok(BundleOutput { digest: bundle.digest(), signing_hash: bundle.signing_hash(), bundle, signature, signer })
    }

    /// Execute the bundle command
    pub fn run(&self) -> Result<()> {
        write_json(&self.execute()?, self.output.as_ref())
    }
}
