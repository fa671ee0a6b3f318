//! Common utilities shared by the CLI, the device layer and scenarios

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};
