use crate::error::IntoCoreError;
use crate::Error;
use crate::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level.
    pub level: LogLevel,

    /// Log format.
    pub format: LogFormat,

    /// Include the event target (module path) in each line.
    pub with_target: bool,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level.
    Error,

    /// Warning level.
    Warn,

    /// Info level.
    Info,

    /// Debug level.
    Debug,

    /// Trace level.
    Trace,
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format.
    Json,

    /// Text format.
    Text,

    /// Pretty format.
    Pretty,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            with_target: false,
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Load any TOML-backed configuration section from file.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read config file {}: {}", path.display(), e)))?;

    toml::from_str(&content).with_context("Failed to parse config")
}

/// Save a configuration section as TOML.
pub fn save_toml<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(value).with_context("Failed to serialize config")?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_config_roundtrips_through_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logging.toml");
        let config = LoggingConfig {
            level: LogLevel::Debug,
            format: LogFormat::Json,
            with_target: true,
        };

        save_toml(&config, &path).unwrap();
        let loaded: LoggingConfig = load_toml(&path).unwrap();

        assert_eq!(loaded.level, LogLevel::Debug);
        assert_eq!(loaded.format, LogFormat::Json);
        assert!(loaded.with_target);
    }

    #[test]
    fn test_missing_fields_fall_back_to_defaults() {
        let parsed: LoggingConfig = toml::from_str("level = \"warn\"").unwrap();
        assert_eq!(parsed.level, LogLevel::Warn);
        assert_eq!(parsed.format, LogFormat::Text);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "level = [").unwrap();

        let err = load_toml::<LoggingConfig>(&path).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_load_reports_missing_file_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let err = load_toml::<LoggingConfig>(&path).unwrap_err();
        assert!(matches!(&err, Error::Config(msg) if msg.contains("absent.toml")));
    }
}
