//! Configuration
//!
//! Tunables for a clipboard session: the outbound-query time budget, the
//! event listener tick, and the payload size limit. Loadable from TOML and
//! validated before use; the query timeout is additionally settable at
//! runtime through [`Clipboard::set_query_timeout`](crate::Clipboard::set_query_timeout).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ClipboardError, Result};

/// Clipboard session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Total time budget for one outbound content query, in milliseconds.
    ///
    /// The budget is divided evenly across the candidate format list, so a
    /// query over the five text aliases waits 200 ms per attempt at the
    /// default. Historically this knob was expressed as a per-attempt value.
    pub query_timeout_ms: u64,

    /// Event listener tick, in milliseconds.
    ///
    /// Upper bound on how long the background task blocks on the transport
    /// before re-checking its stop flag.
    pub poll_interval_ms: u64,

    /// Maximum accepted payload size in bytes
    pub max_data_size: usize,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: 1000,
            poll_interval_ms: 50,
            max_data_size: 16 * 1024 * 1024, // 16MB
        }
    }
}

impl ClipboardConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ClipboardConfig = toml::from_str(&content)
            .map_err(|e| ClipboardError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.query_timeout_ms == 0 {
            return Err(ClipboardError::InvalidConfig(
                "query_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(ClipboardError::InvalidConfig(
                "poll_interval_ms must be greater than zero".into(),
            ));
        }
        if self.max_data_size == 0 {
            return Err(ClipboardError::InvalidConfig(
                "max_data_size must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Query time budget as a [`Duration`]
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    /// Listener tick as a [`Duration`]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClipboardConfig::default();
        assert_eq!(config.query_timeout_ms, 1000);
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.max_data_size, 16 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: ClipboardConfig = toml::from_str("query_timeout_ms = 250").unwrap();
        assert_eq!(config.query_timeout_ms, 250);
        // Unspecified fields fall back to defaults
        assert_eq!(config.poll_interval_ms, 50);
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ClipboardConfig {
            query_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = ClipboardConfig::default();
        assert_eq!(config.query_timeout(), Duration::from_millis(1000));
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
    }
}
