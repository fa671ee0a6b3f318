//! Firmware test harness
//!
//! Drives a device under test through a command channel and validates its
//! behaviour against the state-update telemetry it reports.

pub mod cli;
pub mod commands;
pub mod common;
pub mod device;
pub mod scenario;
pub mod telemetry;

// Re-export commonly used types for tests
pub use common::{Error, Result};
pub use scenario::{Bench, Scenario, ScenarioBuilder, ScenarioOutcome, SimTime};
pub use telemetry::{StateRecord, StateStore, Telemetry};
