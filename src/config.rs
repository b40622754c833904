//! Configuration for the aggregation engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the aggregation engine and its boundaries.
///
/// All options are fixed at process start; there is no hot reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Trailing time span a reading stays in its key's window
    #[serde(with = "duration_serde")]
    pub window_size: Duration,

    /// Flush cadence of the scheduler
    #[serde(with = "duration_serde")]
    pub publish_interval: Duration,

    /// Which percentile to report alongside the median (e.g. 75.0)
    pub percentile: f64,

    /// Namespace prefix for store keys (`{prefix}/{reading_key}`)
    pub store_key_prefix: String,

    /// Field names to aggregate. An empty list aggregates every numeric
    /// field observed in the window.
    pub fields: Vec<String>,

    /// Port for the HTTP ingest server
    pub listen_port: u16,

    /// Optional webhook URL to POST aggregate records to
    pub publish_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: Duration::from_secs(30),
            publish_interval: Duration::from_secs(10),
            percentile: 75.0,
            store_key_prefix: "telemetry".to_string(),
            fields: vec![
                "temperature".to_string(),
                "pressure".to_string(),
                "vibration".to_string(),
            ],
            listen_port: 6001,
            publish_url: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location, or from an explicit path.
    pub fn load(path: Option<&PathBuf>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::Io(e.to_string()))?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else if path.is_some() {
            Err(ConfigError::Io(format!(
                "config file not found: {}",
                config_path.display()
            )))
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sensor-aggregator")
            .join("config.json")
    }

    /// Check option values that serde cannot reject on its own.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size.is_zero() {
            return Err(ConfigError::Invalid("window_size must be positive".into()));
        }
        if self.publish_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "publish_interval must be positive".into(),
            ));
        }
        if !(self.percentile > 0.0 && self.percentile <= 100.0) {
            return Err(ConfigError::Invalid(format!(
                "percentile must be in (0, 100], got {}",
                self.percentile
            )));
        }
        if self.store_key_prefix.is_empty() {
            return Err(ConfigError::Invalid(
                "store_key_prefix must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Serialize(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {e}"),
            ConfigError::Parse(e) => write!(f, "Parse error: {e}"),
            ConfigError::Serialize(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration as integer seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.window_size, Duration::from_secs(30));
        assert_eq!(config.publish_interval, Duration::from_secs(10));
        assert_eq!(config.percentile, 75.0);
        assert_eq!(config.store_key_prefix, "telemetry");
        assert_eq!(config.fields.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_percentile() {
        let mut config = Config::default();
        config.percentile = 0.0;
        assert!(config.validate().is_err());

        config.percentile = 101.0;
        assert!(config.validate().is_err());

        config.percentile = 100.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_durations() {
        let mut config = Config::default();
        config.window_size = Duration::ZERO;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.publish_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.window_size, config.window_size);
        assert_eq!(parsed.publish_interval, config.publish_interval);
    }
}
