use clap::Parser;

/// Main command enumeration for the fwctl CLI tool
#[derive(Parser, Debug)]
#[command(name = "fwctl", infer_subcommands = true, version)]
pub enum MainCmd {
    /// Compute the call hash policies approve
    CallHash(crate::hash::CallHashCmd),
    /// Compute the vector hash of every prefix of a selector sequence
    VectorHashes(crate::hash::VectorHashesCmd),
    /// Build, sign or verify an approval bundle
    Bundle(crate::bundle::Cmd),
    /// Simulate a scenario of transactions against a configured firewall deployment
    Simulate(crate::simulate::Cmd),
}

/// Error types for the main command system
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Command failure
    #[error("{0}")]
    Cli(#[from] crate::common::CliError),
}

impl MainCmd {
    /// Execute the main command
    pub fn run(&self) -> Result<(), Error> {
        match self {
            Self::CallHash(cmd) => cmd.run()?,
            Self::VectorHashes(cmd) => cmd.run()?,
            Self::Bundle(cmd) => cmd.run()?,
            Self::Simulate(cmd) => cmd.run()?,
        }
        Ok(())
    }
}
