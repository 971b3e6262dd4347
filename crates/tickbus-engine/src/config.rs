//! Configuration loading for the engine binary.
//!
//! The engine reads `tickbus-config.yaml` from the working directory when it
//! exists and falls back to defaults otherwise. Every section and field is
//! optional.
//!
//! ```yaml
//! engine:
//!   tick_interval_ms: 100
//!   max_ticks: 50
//!   seed: 42
//! logging:
//!   level: info
//!   json: false
//! bus:
//!   queue_capacity: 64
//!   backlog_warn_threshold: 1024
//! ```
//!
//! `TICKBUS_MAX_TICKS` overrides `engine.max_ticks`.

use std::path::Path;

use serde::Deserialize;
use tickbus_core::BusConfig;

/// Environment variable that overrides `engine.max_ticks`.
pub const MAX_TICKS_ENV: &str = "TICKBUS_MAX_TICKS";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but holds an unusable value.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Tick loop settings.
    #[serde(default)]
    pub engine: LoopConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Event bus tunables.
    #[serde(default)]
    pub bus: BusConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is unusable.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.apply_max_ticks_override(std::env::var(MAX_TICKS_ENV).ok().as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string without overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Apply a raw `TICKBUS_MAX_TICKS` value, if one is set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the value is not an unsigned
    /// integer.
    pub fn apply_max_ticks_override(&mut self, raw: Option<&str>) -> Result<(), ConfigError> {
        let Some(raw) = raw else {
            return Ok(());
        };
        self.engine.max_ticks = raw.trim().parse().map_err(|_err| ConfigError::Invalid {
            reason: format!("{MAX_TICKS_ENV} must be an unsigned integer, got {raw:?}"),
        })?;
        Ok(())
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `engine.tick_interval_ms` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.tick_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "engine.tick_interval_ms must be at least 1".to_owned(),
            });
        }
        Ok(())
    }
}

/// Tick loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoopConfig {
    /// Real-time milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Stop after this many ticks. `0` runs until interrupted.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,

    /// Seed for the scenario's random events.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: default_max_ticks(),
            seed: default_seed(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

const fn default_tick_interval_ms() -> u64 {
    100
}

const fn default_max_ticks() -> u64 {
    50
}

const fn default_seed() -> u64 {
    42
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = EngineConfig::default();
        assert_eq!(config.engine.tick_interval_ms, 100);
        assert_eq!(config.engine.max_ticks, 50);
        assert_eq!(config.engine.seed, 42);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
        assert_eq!(config.bus, BusConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
engine:
  tick_interval_ms: 16
  max_ticks: 0
  seed: 7
logging:
  level: debug
  json: true
bus:
  queue_capacity: 128
  backlog_warn_threshold: 0
";
        let config = EngineConfig::parse(yaml).unwrap();
        assert_eq!(config.engine.tick_interval_ms, 16);
        assert_eq!(config.engine.max_ticks, 0);
        assert_eq!(config.engine.seed, 7);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
        assert_eq!(config.bus.queue_capacity, 128);
        assert_eq!(config.bus.backlog_warn_threshold, 0);
    }

    #[test]
    fn empty_sections_use_defaults() {
        let config = EngineConfig::parse("logging:\n  json: true\n").unwrap();
        assert_eq!(config.engine, LoopConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.json);
    }

    #[test]
    fn invalid_yaml_is_an_error() {
        let err = EngineConfig::parse("engine: [unclosed").unwrap_err();
        assert!(matches!(err, ConfigError::Yaml { .. }));
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let config = EngineConfig::parse("engine:\n  tick_interval_ms: 0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn max_ticks_override() {
        let mut config = EngineConfig::default();
        config.apply_max_ticks_override(None).unwrap();
        assert_eq!(config.engine.max_ticks, 50);

        config.apply_max_ticks_override(Some(" 500 ")).unwrap();
        assert_eq!(config.engine.max_ticks, 500);

        let err = config.apply_max_ticks_override(Some("lots")).unwrap_err();
        assert!(err.to_string().contains(MAX_TICKS_ENV));
        assert_eq!(config.engine.max_ticks, 500);
    }

    #[test]
    fn missing_file_is_io_error() {
        let path = Path::new("does/not/exist.yaml");
        let err = EngineConfig::from_file(path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
