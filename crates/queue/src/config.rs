//! Queue configuration.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Where the offline queue database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// `<platform data dir>/issuerelay/queue.db`.
    Default,
    /// Explicit database file path.
    Path(PathBuf),
    /// Transient in-memory database (tests, ephemeral hosts).
    InMemory,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name} URL '{value}': {source}")]
    InvalidUrl {
        name: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
}

/// Configuration for the issue queue and its sync worker.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Base URL of the host exposing the issues API (`{api_base}/api/issues`).
    pub api_base: String,
    /// Base URL of the external tracker; its `/issues/new` form is opened
    /// pre-filled during handoff.
    pub tracker_base: String,
    /// Offline queue storage location.
    pub store: StoreLocation,
    /// Timeout applied to every issues-API request.
    pub request_timeout: Duration,
    /// Timeout for the tracker reachability probe.
    pub probe_timeout: Duration,
    /// Background submission sweep interval.
    pub sweep_interval: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8080".to_string(),
            tracker_base: "https://github.com/issuerelay/issuerelay".to_string(),
            store: StoreLocation::Default,
            request_timeout: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(2),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

impl QueueConfig {
    /// Build a configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `ISSUERELAY_API_URL`, `ISSUERELAY_TRACKER_URL`,
    /// `ISSUERELAY_DATA_DIR` (directory holding `queue.db`).
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(api) = std::env::var("ISSUERELAY_API_URL") {
            config.api_base = api;
        }
        if let Ok(tracker) = std::env::var("ISSUERELAY_TRACKER_URL") {
            config.tracker_base = tracker;
        }
        if let Ok(dir) = std::env::var("ISSUERELAY_DATA_DIR") {
            config.store = StoreLocation::Path(PathBuf::from(dir).join("queue.db"));
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("api_base", &self.api_base),
            ("tracker_base", &self.tracker_base),
        ] {
            Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
                name,
                value: value.clone(),
                source,
            })?;
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("request_timeout"));
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("probe_timeout"));
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("sweep_interval"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(QueueConfig::default().validate().is_ok());
    }

    #[test]
    fn malformed_api_base_is_rejected() {
        let config = QueueConfig {
            api_base: "not a url".to_string(),
            ..QueueConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUrl { name: "api_base", .. })
        ));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let config = QueueConfig {
            sweep_interval: Duration::ZERO,
            ..QueueConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroDuration("sweep_interval"))
        ));
    }
}
