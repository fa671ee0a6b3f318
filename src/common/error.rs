//! Error types for the firmware harness
//!
//! Only harness-level problems end up here: a broken bridge, a bad config or
//! fixture. Scenario failures are values (see `scenario::ScenarioOutcome`) and
//! malformed telemetry is dropped inside the ingestor.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    // === Bridge/Transport Errors ===
    #[error("Bridge program '{name}' not found. Searched: {searched}")]
    BridgeNotFound { name: String, searched: String },

    #[error("Bridge failed to start: {0}")]
    BridgeStartFailed(String),

    #[error("Bridge connection closed")]
    BridgeClosed,

    #[error("Bridge protocol error: {0}")]
    BridgeProtocol(String),

    // === Device Errors ===
    #[error("Refusing to set device clock to {0}: the value is reserved for 'time never set'")]
    ReservedTime(u32),

    // === Configuration Errors ===
    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Fixture Errors ===
    #[error("Invalid fixture '{path}': {reason}")]
    Fixture { path: String, reason: String },

    #[error("Invalid fixture event {guid}: {reason}")]
    FixtureEvent { guid: String, reason: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a bridge not found error with search paths
    pub fn bridge_not_found<S: AsRef<str>>(name: &str, paths: &[S]) -> Self {
        Self::BridgeNotFound {
            name: name.to_string(),
            searched: paths.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", "),
        }
    }

    /// Create a fixture document error
    pub fn fixture(path: &str, reason: impl Into<String>) -> Self {
        Self::Fixture {
            path: path.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a fixture event error
    pub fn fixture_event(guid: &str, reason: impl Into<String>) -> Self {
        Self::FixtureEvent {
            guid: guid.to_string(),
            reason: reason.into(),
        }
    }
}
