//! Process-wide logging setup.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, e.g. `info` or `trainflow=debug,info`.
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit one JSON object per line instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl LoggingConfig {
    /// Checks that the level parses as a filter directive.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the directive is malformed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        EnvFilter::try_new(&self.level)
            .map(|_| ())
            .map_err(|e| ConfigError::invalid("logging.level", e.to_string()))
    }
}

static INIT: OnceLock<bool> = OnceLock::new();

/// Installs the global `tracing` subscriber once per process.
///
/// Later calls are no-ops and report whether the first one installed a
/// subscriber. If another subscriber was already set globally, this returns
/// `false` without touching it.
///
/// # Errors
///
/// Returns `ConfigError::Logging` if the filter directive is malformed.
pub fn init_logging(config: &LoggingConfig) -> Result<bool, ConfigError> {
    if let Some(installed) = INIT.get() {
        return Ok(*installed);
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| ConfigError::Logging(e.to_string()))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init().is_ok()
    } else {
        builder.try_init().is_ok()
    };

    Ok(*INIT.get_or_init(|| installed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        let config = LoggingConfig::default();
        let first = init_logging(&config).unwrap();
        let second = init_logging(&config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_validate_level() {
        assert!(LoggingConfig::default().validate().is_ok());
        let bad = LoggingConfig {
            level: "trainflow=[".to_string(),
            json: false,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_json_defaults() {
        let config: LoggingConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LoggingConfig::default());
    }
}
