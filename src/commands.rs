//! CLI command definitions

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Run scenario fixtures against the device, one after another
    ///
    /// Prints one result line per scenario. The exit code only reports
    /// whether the run completed, not whether the scenarios passed.
    Run {
        /// Scenario fixture files (JSON or YAML)
        #[arg(required = true)]
        fixtures: Vec<PathBuf>,

        /// Run against the built-in simulated firmware instead of the bridge
        #[arg(long)]
        simulate: bool,

        /// Log every met expectation and dump the state on failures
        #[arg(long, short)]
        verbose: bool,
    },

    /// Validate scenario and behaviour fixture files
    Check {
        /// Fixture files (JSON or YAML)
        #[arg(required = true)]
        fixtures: Vec<PathBuf>,
    },

    /// Show firmware state updates until interrupted
    Monitor,
}
