//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Transport bridge settings
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Device timing settings
    #[serde(default)]
    pub device: DeviceConfig,

    /// Telemetry decoding settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// The external process that owns the serial link and wire encoding
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Path or name (looked up on PATH) of the bridge executable
    #[serde(default = "default_bridge_program")]
    pub program: String,

    /// Additional arguments to pass to the bridge
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            program: default_bridge_program(),
            args: Vec::new(),
        }
    }
}

fn default_bridge_program() -> String {
    "harness-bridge".to_string()
}

/// Timing of the device under test
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    /// Pause after every command so the firmware can process it
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// How long a full reset waits for the device to boot again
    #[serde(default = "default_reboot_wait")]
    pub reboot_wait_secs: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay(),
            reboot_wait_secs: default_reboot_wait(),
        }
    }
}

fn default_settle_delay() -> u64 {
    500
}
fn default_reboot_wait() -> u64 {
    70
}

impl DeviceConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn reboot_wait(&self) -> Duration {
        Duration::from_secs(self.reboot_wait_secs)
    }
}

/// Telemetry frame settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Opcode reserved for firmware state updates
    #[serde(default = "default_opcode")]
    pub opcode: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            opcode: default_opcode(),
        }
    }
}

/// Opcode under which the bridge forwards firmware state frames
pub const DEFAULT_TELEMETRY_OPCODE: u16 = 0x2B0A;

fn default_opcode() -> u16 {
    DEFAULT_TELEMETRY_OPCODE
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// Resolve the bridge executable
    ///
    /// Tries the configured value as a path first, then searches PATH
    pub fn resolve_bridge(&self) -> Result<PathBuf> {
        let candidate = PathBuf::from(&self.bridge.program);
        if candidate.is_file() {
            return Ok(candidate);
        }

        which::which(&self.bridge.program).map_err(|_| {
            let searched = std::env::var("PATH").unwrap_or_default();
            let dirs: Vec<String> = std::env::split_paths(&searched)
                .map(|p| p.display().to_string())
                .collect();
            Error::bridge_not_found(&self.bridge.program, &dirs)
        })
    }
}
