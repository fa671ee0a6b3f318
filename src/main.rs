//! Firmware test harness
//!
//! Runs time-ordered scenarios against a device under test and checks its
//! behaviour through the firmware's state telemetry.

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use harness::common::logging;
use harness::{cli, commands};

#[derive(Parser)]
#[command(name = "harness", about = "Hardware-in-the-loop firmware scenario runner")]
#[command(version, long_about = None)]
struct Cli {
    /// Configuration file (default: the per-user config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Commands::Run { .. } = cli.command {
        if let Some(log_file) = logging::init_run() {
            eprintln!("Logging to {}", log_file.display());
        }
    } else {
        logging::init_cli();
    }

    if let Err(e) = cli::dispatch(cli.command, cli.config.as_deref()).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
