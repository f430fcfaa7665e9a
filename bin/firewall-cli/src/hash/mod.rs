use alloy_primitives::{Address, Bytes, Selector, B256, U256};
use clap::Parser;
use onchain_firewall::{call_hash, prefix_vector_hashes};

use crate::common::{parse_hex, Result};

/// Compute the call hash policies approve
#[derive(Parser, Debug)]
pub struct CallHashCmd {
    /// The protected consumer
    #[arg(long = "consumer")]
    pub consumer: Address,

    /// Immediate caller of the consumer
    #[arg(long = "sender", visible_aliases = ["from"])]
    pub sender: Address,

    /// Transaction origin. Defaults to the sender
    #[arg(long = "origin")]
    pub origin: Option<Address>,

    /// Calldata (hex string)
    #[arg(long = "data", visible_aliases = ["input"], default_value = "0x", value_parser = parse_hex)]
    pub data: Bytes,

    /// Attached native value
    #[arg(long = "value", default_value = "0")]
    pub value: U256,
}

impl CallHashCmd {
    /// The call hash.
    pub fn hash(&self) -> B256 {
        call_hash(self.consumer, self.sender, self.origin.unwrap_or(self.sender), &self.data, self.value)
    }

    /// Execute the call-hash command
    pub fn run(&self) -> Result<()> {
        println!("{}", self.hash());
        Ok(())
    }
}

/// Compute the vector hash of every prefix of a selector sequence
#[derive(Parser, Debug)]
pub struct VectorHashesCmd {
    /// Selectors in call order (hex strings)
    #[arg(value_name = "SELECTOR", required = true)]
    pub selectors: Vec<Selector>,
}

impl VectorHashesCmd {
    /// One hash per prefix, shortest first.
    pub fn hashes(&self) -> Vec<B256> {
        prefix_vector_hashes(&self.selectors)
    }

    /// Execute the vector-hashes command
    pub fn run(&self) -> Result<()> {
        for hash in self.hashes() {
            println!("{hash}");
        }
        Ok(())
    }
}
