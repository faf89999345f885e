use std::{fs, path::Path};

use chrono::TimeDelta;
use log::info;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Error reading configuration file")]
    Io(#[from] std::io::Error),

    #[error("Error deserializing configuration")]
    Deserialize(#[from] toml::de::Error),
}

/// What a producer does when its slot still holds an unconsumed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotPolicy {
    /// Wait for the consumer to drain the slot.
    #[default]
    Block,
    /// Replace the unconsumed value; the replacement is counted.
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub odometry: OdometryConfig,
    pub health: HealthConfig,
    pub synchronizer: SynchronizerConfig,
    pub sink: SinkConfig,
}

impl Config {
    /// Loads the configuration from a TOML file. A missing file is not an
    /// error: defaults apply.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            info!(
                "No configuration file at '{}', using defaults",
                path.display()
            );
            return Ok(Config::default());
        }

        info!("Reading configuration from '{}'", path.display());
        Ok(toml::from_str(&fs::read_to_string(path)?)?)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OdometryConfig {
    /// Command producing protocol lines on its stdout.
    pub command: String,
    pub args: Vec<String>,
    pub policy: SlotPolicy,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            command: "./odometry/odometryMain".to_string(),
            args: vec![],
            policy: SlotPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HealthConfig {
    pub cadence_ms: i64,
    pub policy: SlotPolicy,
}

impl HealthConfig {
    pub fn cadence(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.cadence_ms)
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            cadence_ms: 500,
            policy: SlotPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynchronizerConfig {
    pub poll_ms: i64,
    pub pairing_timeout_ms: i64,
}

impl SynchronizerConfig {
    pub fn poll_interval(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.poll_ms)
    }

    pub fn pairing_timeout(&self) -> TimeDelta {
        TimeDelta::milliseconds(self.pairing_timeout_ms)
    }
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            poll_ms: 500,
            pairing_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SinkConfig {
    pub format: SinkFormat,
}
