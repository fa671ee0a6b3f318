//! CLI command handling
//!
//! Loads configuration and fixtures, drives scenarios and formats output.

mod connect;

use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::Colorize;

use crate::commands::Commands;
use crate::common::config::Config;
use crate::common::{Error, Result};
use crate::scenario::fixture::{self, FixtureDocument};
use crate::scenario::{run_sequence, Scenario, ScenarioOutcome};

pub use connect::open_bench;

/// Dispatch a CLI command
pub async fn dispatch(command: Commands, config_path: Option<&Path>) -> Result<()> {
    let config = match config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match command {
        Commands::Run {
            fixtures,
            simulate,
            verbose,
        } => run(&config, &fixtures, simulate, verbose).await,
        Commands::Check { fixtures } => check(&fixtures),
        Commands::Monitor => monitor(&config).await,
    }
}

/// Load every scenario fixture up front so a bad file fails before the device is touched
fn load_scenarios(paths: &[PathBuf]) -> Result<Vec<Scenario>> {
    let mut scenarios = Vec::with_capacity(paths.len());
    for path in paths {
        match fixture::load_document(path)? {
            FixtureDocument::Scenario(document) => {
                scenarios.push(document.to_scenario(&fixture::default_name(path))?);
            }
            FixtureDocument::Behaviour(document) => {
                document.validate()?;
                tracing::warn!(
                    path = %path.display(),
                    "Behaviour fixtures are only validated, not uploaded; skipping"
                );
            }
        }
    }
    Ok(scenarios)
}

async fn run(config: &Config, paths: &[PathBuf], simulate: bool, verbose: bool) -> Result<()> {
    let scenarios = load_scenarios(paths)?;
    let bench = open_bench(config, simulate).await?.with_verbose(verbose);

    // scenarios block on settle delays and waits
    let (bench, outcomes) = tokio::task::spawn_blocking(move || {
        let mut bench = bench;
        let outcomes = run_sequence(&mut bench, scenarios);
        (bench, outcomes)
    })
    .await
    .map_err(|e| Error::Internal(format!("Scenario thread failed: {e}")))?;
    drop(bench);

    for outcome in &outcomes {
        print_outcome(outcome);
    }

    let failed = outcomes.iter().filter(|o| !o.passed()).count();
    tracing::info!(total = outcomes.len(), failed, "Run complete");
    Ok(())
}

fn print_outcome(outcome: &ScenarioOutcome) {
    let line = outcome.to_string();
    if outcome.passed() {
        println!("{} {}", "✓".green(), line.green());
    } else {
        println!("{} {}", "✗".red(), line.red());
    }
}

fn check(paths: &[PathBuf]) -> Result<()> {
    let mut first_error = None;

    for path in paths {
        let result = fixture::load_document(path).and_then(|document| match document {
            FixtureDocument::Scenario(doc) => doc
                .validate()
                .map(|commands| format!("scenario, {} events", commands.len())),
            FixtureDocument::Behaviour(doc) => doc
                .validate()
                .map(|()| format!("behaviour store, {} entries", doc.entries.len())),
        });

        match result {
            Ok(summary) => println!("{} {} ({})", "✓".green(), path.display(), summary.dimmed()),
            Err(e) => {
                println!("{} {}: {}", "✗".red(), path.display(), e);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

async fn monitor(config: &Config) -> Result<()> {
    let mut bench = open_bench(config, false).await?;
    println!("{}", "Monitoring firmware state, Ctrl-C to stop".cyan());

    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    let mut shown = 0;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let history = bench.history();
                for entry in history.entries().iter().skip(shown) {
                    println!("{entry}");
                }
                shown = history.len();
            }
        }
    }

    let history_len = bench.history().len();
    println!("\n{}", "Firmware state:".cyan());
    print!("{}", bench.store());
    println!("{} {}", "History entries:".cyan(), history_len);
    Ok(())
}
