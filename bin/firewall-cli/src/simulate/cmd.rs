use std::path::PathBuf;

use clap::Parser;

use super::{Scenario, SimulationOutput};
use crate::common::{load_json, write_json, LogArgs, Result};

/// Simulate a scenario of transactions against a configured firewall deployment
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Scenario file (JSON). If '-' is specified, the scenario is read from stdin
    #[arg(value_name = "SCENARIO")]
    pub scenario: PathBuf,

    /// Include the ledger state after the last transaction in the output
    #[arg(long = "dump")]
    pub dump: bool,

    /// Output file (if not specified, prints to console)
    #[arg(long = "output", short = 'o')]
    pub output: Option<PathBuf>,

    /// Logging configuration
    #[command(flatten)]
    pub log_args: LogArgs,
}

impl Cmd {
    /// Loads and simulates the scenario.
    pub fn execute(&self) -> Result<SimulationOutput> {
        let scenario: Scenario = load_json(&self.scenario)?;
        scenario.simulate(self.dump)
    }

    /// Execute the simulate command
    pub fn run(&self) -> Result<()> {
        self.log_args.init()?;
        write_json(&self.execute()?, self.output.as_ref())
    }
}
