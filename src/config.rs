//! Transport configuration parsing and validation.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::codec::MAX_LINE_BYTES;
use crate::transport::DEFAULT_SHUTDOWN_SIGNALS;
use crate::{AppError, Result};

fn default_max_line_bytes() -> usize {
    MAX_LINE_BYTES
}

fn default_shutdown_signals() -> Vec<String> {
    DEFAULT_SHUTDOWN_SIGNALS.iter().map(|&name| name.to_owned()).collect()
}

/// Transport configuration, usually parsed from a small TOML file.
///
/// Every field has a default, so an empty document is a valid config.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct TransportConfig {
    /// Longest inbound line accepted before it is skipped as oversized.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
    /// Signals that trigger a graceful `stop` of the transport.
    #[serde(default = "default_shutdown_signals")]
    pub shutdown_signals: Vec<String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: default_max_line_bytes(),
            shutdown_signals: default_shutdown_signals(),
        }
    }
}

impl TransportConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_line_bytes == 0 {
            return Err(AppError::Config(
                "max_line_bytes must be greater than zero".into(),
            ));
        }

        if self.shutdown_signals.iter().any(|name| name.trim().is_empty()) {
            return Err(AppError::Config(
                "shutdown_signals must not contain blank names".into(),
            ));
        }

        Ok(())
    }
}
