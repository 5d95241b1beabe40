//! Configuration - TOML to SyncConfig conversion
//!
//! # Format
//!
//! ```toml
//! [runtime]
//! read_period_ms = 20
//! write_sleep_us = 1000
//!
//! [system]
//! root = "/World/Bridges/"
//!
//! [[components]]
//! name = "plc_a"
//!
//! [components.options]
//! address = "10.0.0.4"
//! enabled = true
//! ```

use crate::attr::AttrValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Loop timing for one component runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Target period of the read loop in milliseconds
    pub read_period_ms: u64,
    /// Pause between write loop iterations in microseconds
    pub write_sleep_us: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            read_period_ms: 20,
            write_sleep_us: 1000,
        }
    }
}

impl RuntimeConfig {
    /// Read loop period
    pub fn read_period(&self) -> Duration {
        Duration::from_millis(self.read_period_ms)
    }

    /// Write loop sleep
    pub fn write_sleep(&self) -> Duration {
        Duration::from_micros(self.write_sleep_us)
    }

    /// Set the read period
    pub fn with_read_period(mut self, period: Duration) -> Self {
        self.read_period_ms = period.as_millis() as u64;
        self
    }

    /// Set the write sleep
    pub fn with_write_sleep(mut self, sleep: Duration) -> Self {
        self.write_sleep_us = sleep.as_micros() as u64;
        self
    }
}

/// Where components live in the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Document path components are created under
    pub root: String,
    /// Options every component starts from
    pub defaults: BTreeMap<String, AttrValue>,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            root: "/World/Bridges/".to_string(),
            defaults: BTreeMap::new(),
        }
    }
}

/// A component declared up front
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentConfig {
    pub name: String,
    #[serde(default)]
    pub options: BTreeMap<String, AttrValue>,
}

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

impl SyncConfig {
    /// Parse configuration from TOML text
    pub fn from_str(content: &str) -> ConfigResult<Self> {
        let config: SyncConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.runtime.read_period_ms == 0 {
            return Err(ConfigError::Validation(
                "runtime.read_period_ms must be greater than zero".to_string(),
            ));
        }
        if !self.system.root.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "system.root must be an absolute path, got '{}'",
                self.system.root
            )));
        }
        if let Some(c) = self.components.iter().find(|c| c.name.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "component with options {:?} has an empty name",
                c.options.keys().collect::<Vec<_>>()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::from_str("").unwrap();
        assert_eq!(config.runtime.read_period(), Duration::from_millis(20));
        assert_eq!(config.runtime.write_sleep(), Duration::from_millis(1));
        assert_eq!(config.system.root, "/World/Bridges/");
        assert!(config.components.is_empty());
    }

    #[test]
    fn test_full_document() {
        let config = SyncConfig::from_str(
            r#"
            [runtime]
            read_period_ms = 50

            [system]
            root = "/Plant/"
            [system.defaults]
            enabled = false

            [[components]]
            name = "plc_a"
            [components.options]
            address = "10.0.0.4"
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.runtime.read_period_ms, 50);
        assert_eq!(config.runtime.write_sleep_us, 1000);
        assert_eq!(config.system.defaults["enabled"], AttrValue::Bool(false));
        assert_eq!(config.components[0].name, "plc_a");
        assert_eq!(config.components[0].options["address"], AttrValue::from("10.0.0.4"));
    }

    #[test]
    fn test_validation() {
        assert!(matches!(
            SyncConfig::from_str("[runtime]\nread_period_ms = 0\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            SyncConfig::from_str("[system]\nroot = \"relative\"\n"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(SyncConfig::from_str("[runtime"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_duration_builders() {
        let config = RuntimeConfig::default()
            .with_read_period(Duration::from_millis(5))
            .with_write_sleep(Duration::from_micros(250));
        assert_eq!(config.read_period_ms, 5);
        assert_eq!(config.write_sleep_us, 250);
    }
}
