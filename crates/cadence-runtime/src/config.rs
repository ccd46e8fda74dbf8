//! Runtime configuration loaded from TOML.

use std::fs;
use std::path::Path;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML encode error: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    pub driver: DriverConfig,
    pub logging: LoggingConfig,
}

/// Control loop settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    /// Control period in milliseconds. Must be greater than zero.
    pub period_ms: u64,
    /// Whether the robot starts enabled.
    pub start_enabled: bool,
    /// Log a warning whenever a tick takes longer than the period.
    pub overrun_warning: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            period_ms: 20,
            start_enabled: false,
            overrun_warning: true,
        }
    }
}

impl DriverConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// Fallback filter when `RUST_LOG` is unset: trace, debug, info, warn or error.
    pub level: String,
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            ansi: true,
        }
    }
}

const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl RuntimeConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver.period_ms == 0 {
            return Err(ConfigError::Invalid(
                "driver.period_ms must be > 0".to_string(),
            ));
        }
        let level = self.logging.level.trim().to_ascii_lowercase();
        if !LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "logging.level must be one of {}, got '{}'",
                LEVELS.join(", "),
                self.logging.level
            )));
        }
        Ok(())
    }
}

/// Load and validate runtime configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RuntimeConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    RuntimeConfig::from_toml_str(&content)
}

/// JSON schema of [RuntimeConfig], for editor tooling.
pub fn config_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(RuntimeConfig);
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
}
