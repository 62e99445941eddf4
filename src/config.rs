//! Configuration management for the historian
//!
//! This module provides configuration file support with TOML format,
//! environment variable overrides, and sensible defaults. Both knobs are
//! process-wide: they are fixed when the cache manager is constructed and are
//! not tunable per entity.

use serde::{Deserialize, Serialize};

use crate::error::HistoryError;

/// Historian configuration
///
/// # Example
///
/// ```rust
/// use memhist::config::HistorianConfig;
///
/// let config = HistorianConfig::default();
/// assert_eq!(config.sampling_interval_ms, 500);
/// assert_eq!(config.buffer_capacity, 2000);
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HistorianConfig {
    /// Sampling interval requested for live-data subscriptions, in
    /// milliseconds.
    #[serde(default = "default_sampling_interval_ms")]
    pub sampling_interval_ms: u64,

    /// Maximum number of entries kept per entity buffer. Appends beyond this
    /// evict from the oldest end.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
}

// Default value functions
fn default_sampling_interval_ms() -> u64 {
    500
}
fn default_buffer_capacity() -> usize {
    2000
}

impl Default for HistorianConfig {
    fn default() -> Self {
        Self {
            sampling_interval_ms: default_sampling_interval_ms(),
            buffer_capacity: default_buffer_capacity(),
        }
    }
}

impl HistorianConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, HistoryError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            HistoryError::Configuration(format!("Failed to read config file {}: {}", path, e))
        })?;

        toml::from_str(&contents).map_err(|e| {
            HistoryError::Configuration(format!("Failed to parse config file {}: {}", path, e))
        })
    }

    /// Load configuration from a TOML file with environment variable overrides
    pub fn from_file_with_env(path: &str) -> Result<Self, HistoryError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from environment variables only
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(interval) = std::env::var("MEMHIST_SAMPLING_INTERVAL_MS") {
            if let Ok(v) = interval.parse() {
                self.sampling_interval_ms = v;
            }
        }
        if let Ok(capacity) = std::env::var("MEMHIST_BUFFER_CAPACITY") {
            if let Ok(v) = capacity.parse() {
                self.buffer_capacity = v;
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), HistoryError> {
        if self.sampling_interval_ms == 0 {
            return Err(HistoryError::Configuration(
                "Sampling interval must be > 0".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(HistoryError::Configuration(
                "Buffer capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = HistorianConfig::default();
        assert_eq!(config.sampling_interval_ms, 500);
        assert_eq!(config.buffer_capacity, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = HistorianConfig {
            buffer_capacity: 0,
            ..HistorianConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = HistorianConfig {
            sampling_interval_ms: 0,
            ..HistorianConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sampling_interval_ms = 250").unwrap();
        writeln!(file, "buffer_capacity = 16").unwrap();

        let config = HistorianConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.sampling_interval_ms, 250);
        assert_eq!(config.buffer_capacity, 16);
    }

    #[test]
    fn test_from_file_missing_fields_use_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "buffer_capacity = 8").unwrap();

        let config = HistorianConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.sampling_interval_ms, 500);
        assert_eq!(config.buffer_capacity, 8);
    }

    #[test]
    fn test_from_missing_file_errors() {
        let err = HistorianConfig::from_file("/nonexistent/memhist.toml").unwrap_err();
        assert!(matches!(err, HistoryError::Configuration(_)));
    }
}
