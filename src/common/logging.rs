//! Logging and tracing configuration
//!
//! Scenario runs log to a file as well as stderr so the correlation ids
//! printed with failure results can be found afterwards.

use std::path::PathBuf;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

use super::paths;

/// Initialize tracing for short-lived commands (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("harness=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing for scenario runs (file + stderr logging)
///
/// The run logs to both:
/// 1. A log file at `<data dir>/firmware-harness/logs/harness.log`
/// 2. stderr
///
/// Returns the log file path when file logging could be set up.
pub fn init_run() -> Option<PathBuf> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("harness=debug,info"));

    let log_path = match paths::ensure_log_dir() {
        Ok(Some(log_dir)) => Some(log_dir.join("harness.log")),
        _ => None,
    };

    if let Some(log_file) = &log_path {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
        {
            Ok(file) => {
                let file_layer = fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true);

                // stderr stays quieter than the file
                let stderr_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .compact()
                    .with_filter(LevelFilter::INFO);

                tracing_subscriber::registry()
                    .with(filter)
                    .with(file_layer)
                    .with(stderr_layer)
                    .init();

                return log_path;
            }
            Err(e) => {
                eprintln!("Warning: Could not open log file: {}", e);
            }
        }
    }

    // Fallback: stderr only
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .compact(),
        )
        .init();

    None
}
