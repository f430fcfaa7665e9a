//! `fwctl`: command line front-end for the on-chain firewall policy engine.

use clap::Parser;
use firewall_cli::{Error, MainCmd};

fn main() -> Result<(), Error> {
    MainCmd::parse().run().inspect_err(|e| eprintln!("{e}"))
}
