//! Layered resilience configuration.
//!
//! Resolution order, later layers win:
//! 1. Built-in defaults
//! 2. Optional YAML file (schema-validated)
//! 3. Environment variables

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::schema::validate_config_schema;
use crate::flags::{parse_flag_value, FeatureFlag, FlagSnapshot};

/// Failure threshold before a breaker opens.
pub const ENV_BREAKER_THRESHOLD: &str = "CIRCUIT_BREAKER_THRESHOLD";
/// Open timeout in milliseconds.
pub const ENV_BREAKER_TIMEOUT: &str = "CIRCUIT_BREAKER_TIMEOUT";
/// Reset timeout in milliseconds.
pub const ENV_BREAKER_RESET_TIMEOUT: &str = "CIRCUIT_BREAKER_RESET_TIMEOUT";
/// Whether flag reads consult the distributed backend.
pub const ENV_FLAGS_ENABLED: &str = "FEATURE_FLAGS_ENABLED";

/// Errors that can occur when resolving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse config: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Config failed schema validation: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Invalid value for {var}: '{value}' ({reason})")]
    InvalidVar {
        var: String,
        value: String,
        reason: String,
    },
}

/// Circuit breaker tuning shared by every breaker in a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Failures before opening the circuit
    pub failure_threshold: u32,

    /// Time after the last failure before a probe is let through
    #[serde(with = "humantime_duration")]
    pub open_timeout: Duration,

    /// While closed, failures older than this stop counting toward opening
    #[serde(with = "humantime_duration")]
    pub reset_timeout: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_millis(60_000),
            reset_timeout: Duration::from_millis(30_000),
        }
    }
}

/// Feature flag coordination settings and env-seeded defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagSettings {
    /// Consult the distributed backend on reads and propagate writes to it
    pub coordination_enabled: bool,

    /// Namespace prefix for backend keys
    pub key_prefix: String,

    /// Expiry applied to backend entries on write
    #[serde(with = "humantime_duration")]
    pub ttl: Duration,

    /// Seeded value of each flag
    pub defaults: FlagSnapshot,
}

impl Default for FlagSettings {
    fn default() -> Self {
        Self {
            coordination_enabled: false,
            key_prefix: "feature:".to_string(),
            ttl: Duration::from_secs(24 * 60 * 60),
            defaults: FeatureFlag::ALL.iter().map(|flag| (*flag, false)).collect(),
        }
    }
}

impl FlagSettings {
    /// Seeded value for a flag (`false` when unset).
    pub fn default_for(&self, flag: FeatureFlag) -> bool {
        self.defaults.get(&flag).copied().unwrap_or(false)
    }

    /// Set the seeded value for a flag.
    pub fn with_default(mut self, flag: FeatureFlag, enabled: bool) -> Self {
        self.defaults.insert(flag, enabled);
        self
    }

    fn fill_missing_defaults(&mut self) {
        for flag in FeatureFlag::ALL {
            self.defaults.entry(flag).or_insert(false);
        }
    }
}

/// Fully resolved configuration, immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub breaker: BreakerSettings,
    pub flags: FlagSettings,
}

impl ResilienceConfig {
    /// Parse a config file body. Missing sections keep their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let mut value: serde_json::Value = if yaml.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_yaml::from_str(yaml)?
        };
        if value.is_null() {
            value = serde_json::json!({});
        }

        validate_config_schema(&value).map_err(ConfigError::SchemaError)?;

        let mut config: ResilienceConfig = serde_json::from_value(value)?;
        config.flags.fill_missing_defaults();
        Ok(config)
    }

    /// Parse a YAML config file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::resolve(None::<&Path>, |var| std::env::var(var).ok())
    }

    /// Defaults, then the optional file, then the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        Self::resolve(file, |var| std::env::var(var).ok())
    }

    /// Resolve every layer with an explicit variable lookup.
    pub fn resolve<P, F>(file: Option<P>, lookup: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;

        tracing::debug!(
            failure_threshold = config.breaker.failure_threshold,
            open_timeout = ?config.breaker.open_timeout,
            coordination = config.flags.coordination_enabled,
            "Resolved resilience configuration"
        );

        Ok(config)
    }

    /// Overlay environment variables onto this config.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_BREAKER_THRESHOLD) {
            let threshold = parse_number(ENV_BREAKER_THRESHOLD, &raw)?;
            if threshold == 0 {
                return Err(ConfigError::InvalidVar {
                    var: ENV_BREAKER_THRESHOLD.to_string(),
                    value: raw,
                    reason: "must be at least 1".to_string(),
                });
            }
            self.breaker.failure_threshold = u32::try_from(threshold).map_err(|_| {
                ConfigError::InvalidVar {
                    var: ENV_BREAKER_THRESHOLD.to_string(),
                    value: threshold.to_string(),
                    reason: "too large".to_string(),
                }
            })?;
        }

        if let Some(raw) = lookup(ENV_BREAKER_TIMEOUT) {
            self.breaker.open_timeout =
                Duration::from_millis(parse_number(ENV_BREAKER_TIMEOUT, &raw)?);
        }

        if let Some(raw) = lookup(ENV_BREAKER_RESET_TIMEOUT) {
            self.breaker.reset_timeout =
                Duration::from_millis(parse_number(ENV_BREAKER_RESET_TIMEOUT, &raw)?);
        }

        if let Some(raw) = lookup(ENV_FLAGS_ENABLED) {
            self.flags.coordination_enabled = parse_flag_value(&raw);
        }

        for flag in FeatureFlag::ALL {
            if let Some(raw) = lookup(flag.as_str()) {
                self.flags.defaults.insert(flag, parse_flag_value(&raw));
            }
        }
        self.flags.fill_missing_defaults();

        Ok(())
    }

    /// Render as YAML, in the same shape `from_yaml` accepts.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn parse_number(var: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|e| ConfigError::InvalidVar {
        var: var.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

mod humantime_duration {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ResilienceConfig::default();
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.open_timeout, Duration::from_secs(60));
        assert_eq!(config.breaker.reset_timeout, Duration::from_secs(30));
        assert!(!config.flags.coordination_enabled);
        assert_eq!(config.flags.ttl, Duration::from_secs(86_400));
        assert_eq!(config.flags.defaults.len(), FeatureFlag::ALL.len());
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = ResilienceConfig::resolve(
            None::<&Path>,
            vars(&[
                ("CIRCUIT_BREAKER_THRESHOLD", "3"),
                ("CIRCUIT_BREAKER_TIMEOUT", "1000"),
                ("CIRCUIT_BREAKER_RESET_TIMEOUT", "500"),
                ("FEATURE_FLAGS_ENABLED", "true"),
                ("FEATURE_AI_ADVISOR", "true"),
                ("FEATURE_TRADING", "yes"),
            ]),
        )
        .unwrap();

        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.open_timeout, Duration::from_millis(1000));
        assert_eq!(config.breaker.reset_timeout, Duration::from_millis(500));
        assert!(config.flags.coordination_enabled);
        assert!(config.flags.default_for(FeatureFlag::AiAdvisor));
        // Only "true" enables
        assert!(!config.flags.default_for(FeatureFlag::Trading));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut config = ResilienceConfig::from_yaml(
            r#"
breaker:
  failure_threshold: 7
  open_timeout: 2m
flags:
  defaults:
    FEATURE_PRICE_ALERTS: true
"#,
        )
        .unwrap();

        assert_eq!(config.breaker.failure_threshold, 7);
        assert_eq!(config.breaker.open_timeout, Duration::from_secs(120));
        // Untouched keys keep their defaults
        assert_eq!(config.breaker.reset_timeout, Duration::from_secs(30));
        assert!(config.flags.default_for(FeatureFlag::PriceAlerts));
        assert_eq!(config.flags.defaults.len(), FeatureFlag::ALL.len());

        config
            .apply_env(vars(&[
                ("CIRCUIT_BREAKER_THRESHOLD", "2"),
                ("FEATURE_PRICE_ALERTS", "false"),
            ]))
            .unwrap();
        assert_eq!(config.breaker.failure_threshold, 2);
        assert!(!config.flags.default_for(FeatureFlag::PriceAlerts));
    }

    #[test]
    fn test_uppercase_env_flag_seeds_false() {
        let config = ResilienceConfig::resolve(
            None::<&Path>,
            vars(&[
                ("FEATURE_FLAGS_ENABLED", "TRUE"),
                ("FEATURE_AI_ADVISOR", "TRUE"),
                ("FEATURE_TRADING", " true"),
            ]),
        )
        .unwrap();

        assert!(!config.flags.coordination_enabled);
        assert!(!config.flags.default_for(FeatureFlag::AiAdvisor));
        assert!(!config.flags.default_for(FeatureFlag::Trading));
    }

    #[test]
    fn test_invalid_env_number() {
        let result =
            ResilienceConfig::resolve(None::<&Path>, vars(&[("CIRCUIT_BREAKER_TIMEOUT", "soon")]));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidVar { ref var, .. }) if var == "CIRCUIT_BREAKER_TIMEOUT"
        ));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let result =
            ResilienceConfig::resolve(None::<&Path>, vars(&[("CIRCUIT_BREAKER_THRESHOLD", "0")]));
        assert!(matches!(result, Err(ConfigError::InvalidVar { .. })));
    }

    #[test]
    fn test_schema_violation_reported() {
        let result = ResilienceConfig::from_yaml("breaker:\n  retries: 3\n");
        assert!(matches!(result, Err(ConfigError::SchemaError(_))));
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let config = ResilienceConfig::from_yaml("").unwrap();
        assert_eq!(config, ResilienceConfig::default());
    }

    #[test]
    fn test_yaml_output_reloads() {
        let config = ResilienceConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert_eq!(ResilienceConfig::from_yaml(&yaml).unwrap(), config);
    }
}
