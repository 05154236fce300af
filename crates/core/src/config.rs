//! Configuration management for probeforge

use crate::error::{ConfigError, Error, Result};
use crate::{DEFAULT_CONCURRENCY, MAX_CONCURRENCY};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Immutable configuration snapshot for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of concurrent workers (at least 1)
    pub concurrency: usize,
    /// Upper bound on a single probe invocation
    #[serde(with = "seconds", skip_serializing_if = "Option::is_none")]
    pub probe_timeout: Option<Duration>,
    /// Minimum spacing between two dispatches, shared by the whole pool
    #[serde(with = "seconds", skip_serializing_if = "Option::is_none")]
    pub delay: Option<Duration>,
    /// Stop dispatching once any probe succeeds
    pub early_exit: bool,
    /// Append-only destination for successes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// Durations as fractional seconds (`delay = 0.5`)
pub mod seconds {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_f64(duration.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        match Option::<f64>::deserialize(deserializer)? {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map(Some)
                .map_err(|e| de::Error::custom(format!("invalid duration {secs}: {e}"))),
            None => Ok(None),
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            probe_timeout: None,
            delay: None,
            early_exit: false,
            output: None,
        }
    }
}

impl RunConfig {
    /// Start building a run configuration
    pub fn builder() -> RunConfigBuilder {
        RunConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(Error::config(ConfigError::InvalidConcurrency {
                value: self.concurrency,
            }));
        }

        if let Some(timeout) = self.probe_timeout {
            if timeout.is_zero() {
                return Err(Error::config(ConfigError::InvalidTimeout { value: 0 }));
            }
        }

        if let Some(delay) = self.delay {
            if delay.is_zero() {
                return Err(Error::config(ConfigError::InvalidDelay { value: 0 }));
            }
        }

        Ok(())
    }
}

/// Builder for [`RunConfig`]
#[derive(Debug, Default)]
pub struct RunConfigBuilder {
    config: RunConfig,
}

impl RunConfigBuilder {
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = Some(timeout);
        self
    }

    /// Inter-dispatch delay; a zero delay disables pacing
    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = (!delay.is_zero()).then_some(delay);
        self
    }

    pub fn early_exit(mut self, early_exit: bool) -> Self {
        self.config.early_exit = early_exit;
        self
    }

    pub fn output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.output = Some(path.into());
        self
    }

    pub fn build(self) -> RunConfig {
        self.config
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Log format
    pub format: LogFormat,
    /// Include module targets in log lines
    pub targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            targets: false,
        }
    }
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Run settings as written in a file
///
/// Every field is optional; [`RunSettings::apply_to`] only overrides what the
/// file sets, so each command keeps its own defaults for the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    #[serde(with = "seconds", skip_serializing_if = "Option::is_none")]
    pub probe_timeout: Option<Duration>,
    /// Zero disables pacing
    #[serde(with = "seconds", skip_serializing_if = "Option::is_none")]
    pub delay: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub early_exit: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl RunSettings {
    /// Overlay the fields this file sets onto `config`
    pub fn apply_to(&self, config: &mut RunConfig) {
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(timeout) = self.probe_timeout {
            config.probe_timeout = Some(timeout);
        }
        if let Some(delay) = self.delay {
            config.delay = (!delay.is_zero()).then_some(delay);
        }
        if let Some(early_exit) = self.early_exit {
            config.early_exit = early_exit;
        }
        if let Some(output) = &self.output {
            config.output = Some(output.clone());
        }
    }
}

/// File-level configuration: run settings plus logging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Run settings layered over each command's defaults
    pub run: RunSettings,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a `.json`, `.yaml`/`.yml` or `.toml` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_e| {
            Error::config(ConfigError::ConfigFileNotFound {
                path: path.display().to_string(),
            })
        })?;

        let config: Config = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&content)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content).map_err(|e| {
                Error::config(ConfigError::InvalidFormat {
                    reason: e.to_string(),
                })
            })?,
            Some("toml") => toml::from_str(&content).map_err(|e| {
                Error::config(ConfigError::InvalidFormat {
                    reason: e.to_string(),
                })
            })?,
            _ => {
                return Err(Error::config(ConfigError::InvalidFormat {
                    reason: "Unsupported configuration file format".to_string(),
                }))
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file, format chosen by extension
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(self).map_err(|e| {
                Error::config(ConfigError::InvalidFormat {
                    reason: e.to_string(),
                })
            })?,
            Some("toml") => toml::to_string_pretty(self).map_err(|e| {
                Error::config(ConfigError::InvalidFormat {
                    reason: e.to_string(),
                })
            })?,
            _ => {
                return Err(Error::config(ConfigError::InvalidFormat {
                    reason: "Unsupported configuration file format".to_string(),
                }))
            }
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the run settings over the library defaults
    pub fn validate(&self) -> Result<()> {
        let mut run = RunConfig::default();
        self.run.apply_to(&mut run);
        run.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.run, RunSettings::default());
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = RunConfig::builder()
            .concurrency(4)
            .probe_timeout(Duration::from_secs(5))
            .delay(Duration::from_millis(250))
            .early_exit(true)
            .output("found.txt")
            .build();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.probe_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.delay, Some(Duration::from_millis(250)));
        assert!(config.early_exit);
        assert_eq!(config.output, Some(PathBuf::from("found.txt")));
    }

    #[test]
    fn test_zero_delay_disables_pacing() {
        let config = RunConfig::builder().delay(Duration::ZERO).build();
        assert_eq!(config.delay, None);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RunConfig::default();
        assert!(config.validate().is_ok());

        config.concurrency = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidConcurrency { value: 0 }))
        ));

        config.concurrency = MAX_CONCURRENCY + 1;
        assert!(config.validate().is_err());

        config.concurrency = 1;
        config.probe_timeout = Some(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidTimeout { .. }))
        ));

        config.probe_timeout = None;
        config.delay = Some(Duration::ZERO);
        assert!(matches!(
            config.validate(),
            Err(Error::Config(ConfigError::InvalidDelay { .. }))
        ));
    }

    #[test]
    fn test_config_file_operations() {
        let dir = tempdir().unwrap();
        let mut config = Config::default();
        config.run.concurrency = Some(12);
        config.run.delay = Some(Duration::from_millis(500));
        config.run.output = Some(PathBuf::from("found.txt"));
        config.logging.level = LogLevel::Debug;

        for name in ["config.json", "config.yaml", "config.toml"] {
            let path = dir.path().join(name);
            config.to_file(&path).unwrap();
            let loaded = Config::from_file(&path).unwrap();
            assert_eq!(loaded, config, "format {name}");
        }
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[run]\nconcurrency = 3\nearly_exit = true\n").unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.run.concurrency, Some(3));
        assert_eq!(loaded.run.early_exit, Some(true));
        assert_eq!(loaded.run.delay, None);
        assert_eq!(loaded.logging, LoggingConfig::default());
    }

    #[test]
    fn test_settings_only_override_what_they_set() {
        let mut config = RunConfig::builder()
            .concurrency(1)
            .delay(Duration::from_millis(250))
            .early_exit(true)
            .build();
        let settings = RunSettings {
            concurrency: Some(8),
            ..RunSettings::default()
        };
        settings.apply_to(&mut config);
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.delay, Some(Duration::from_millis(250)));
        assert!(config.early_exit);

        RunSettings {
            delay: Some(Duration::ZERO),
            early_exit: Some(false),
            ..RunSettings::default()
        }
        .apply_to(&mut config);
        assert_eq!(config.delay, None);
        assert!(!config.early_exit);
    }

    #[test]
    fn test_durations_read_as_seconds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timing.yaml");
        std::fs::write(&path, "run:\n  delay: 0.25\n  probe_timeout: 3\n").unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.run.delay, Some(Duration::from_millis(250)));
        assert_eq!(loaded.run.probe_timeout, Some(Duration::from_secs(3)));

        let negative = dir.path().join("negative.json");
        std::fs::write(&negative, r#"{"run":{"delay":-1.0}}"#).unwrap();
        assert!(Config::from_file(&negative).is_err());

        let huge = dir.path().join("huge.json");
        std::fs::write(&huge, r#"{"run":{"probe_timeout":1e20}}"#).unwrap();
        assert!(Config::from_file(&huge).is_err());
    }

    #[test]
    fn test_invalid_files() {
        let dir = tempdir().unwrap();

        let missing = Config::from_file(dir.path().join("missing.json")).unwrap_err();
        assert!(matches!(
            missing,
            Error::Config(ConfigError::ConfigFileNotFound { .. })
        ));

        let unsupported = dir.path().join("config.ini");
        std::fs::write(&unsupported, "concurrency=1").unwrap();
        assert!(matches!(
            Config::from_file(&unsupported),
            Err(Error::Config(ConfigError::InvalidFormat { .. }))
        ));

        let invalid = dir.path().join("zero.json");
        std::fs::write(&invalid, r#"{"run":{"concurrency":0}}"#).unwrap();
        assert!(Config::from_file(&invalid).unwrap_err().is_construction_error());
    }
}
