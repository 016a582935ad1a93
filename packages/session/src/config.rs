//! Session configuration.
//!
//! Read from an optional TOML file, then overridden from the environment:
//!
//! | Variable                  | Field                      |
//! |---------------------------|----------------------------|
//! | `REGION_MAP_STATES_URL`   | `acquisition.states_url`   |
//! | `REGION_MAP_COUNTIES_URL` | `acquisition.counties_url` |
//! | `REGION_MAP_BATCH_SIZE`   | `acquisition.batch_size`   |
//! | `REGION_MAP_CONCURRENCY`  | `acquisition.concurrency`  |
//!
//! Unparseable numeric overrides are ignored with a warning.

use std::path::Path;
use std::time::Duration;

use region_map_acquisition::query::{TIGERWEB_COUNTIES_URL, TIGERWEB_STATES_URL};
use region_map_acquisition::transport::DEFAULT_USER_AGENT;
use region_map_acquisition::{RetryPolicy, Timeouts};
use serde::{Deserialize, Serialize};

use crate::SessionError;

/// Remote service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// States layer `query` URL.
    pub states_url: String,
    /// Counties layer `query` URL.
    pub counties_url: String,
    /// Records per ID-range batch.
    pub batch_size: u64,
    /// Attempts per batch, first try included.
    pub max_attempts: u32,
    /// Base delay between attempts, in milliseconds.
    pub backoff_ms: u64,
    /// Batches in flight at once. 1 issues them sequentially.
    pub concurrency: usize,
    /// Timeout of count-only requests, in seconds.
    pub count_timeout_secs: u64,
    /// Timeout of the states request, in seconds.
    pub states_timeout_secs: u64,
    /// Timeout of each ID-range batch, in seconds.
    pub batch_timeout_secs: u64,
    /// Timeout of each per-state batch, in seconds.
    pub partition_timeout_secs: u64,
    /// Coordinate decimals requested for states.
    pub states_geometry_precision: u32,
    /// Coordinate decimals requested for counties.
    pub counties_geometry_precision: u32,
    /// `User-Agent` header.
    pub user_agent: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            states_url: TIGERWEB_STATES_URL.to_string(),
            counties_url: TIGERWEB_COUNTIES_URL.to_string(),
            batch_size: 150,
            max_attempts: 3,
            backoff_ms: 1000,
            concurrency: 1,
            count_timeout_secs: 30,
            states_timeout_secs: 30,
            batch_timeout_secs: 90,
            partition_timeout_secs: 60,
            states_geometry_precision: 6,
            counties_geometry_precision: 2,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AcquisitionConfig {
    /// Retry policy for every batch.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.max_attempts, Duration::from_millis(self.backoff_ms))
    }

    /// Per-request timeouts.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        Timeouts {
            count: Duration::from_secs(self.count_timeout_secs),
            whole: Duration::from_secs(self.states_timeout_secs),
            id_range: Duration::from_secs(self.batch_timeout_secs),
            partition_key: Duration::from_secs(self.partition_timeout_secs),
        }
    }
}

/// Top-level session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Remote service settings.
    pub acquisition: AcquisitionConfig,
    /// State FIPS codes never queried for counties (Puerto Rico, US Virgin
    /// Islands).
    pub excluded_state_fips: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionConfig::default(),
            excluded_state_fips: vec!["72".to_string(), "78".to_string()],
        }
    }
}

impl SessionConfig {
    /// Parses a TOML document. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the TOML is invalid.
    pub fn from_toml_str(toml_str: &str) -> Result<Self, SessionError> {
        toml::de::from_str(toml_str).map_err(|e| SessionError::Config {
            message: e.to_string(),
        })
    }

    /// Reads a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Io`] if the file cannot be read, or
    /// [`SessionError::Config`] if it is invalid.
    pub fn from_file(path: &Path) -> Result<Self, SessionError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Loads `path` if given (defaults otherwise), then applies
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns the error of [`Self::from_file`].
    pub fn load(path: Option<&Path>) -> Result<Self, SessionError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides from `lookup` (an environment-variable reader).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let acquisition = &mut self.acquisition;
        if let Some(url) = lookup("REGION_MAP_STATES_URL") {
            acquisition.states_url = url;
        }
        if let Some(url) = lookup("REGION_MAP_COUNTIES_URL") {
            acquisition.counties_url = url;
        }
        if let Some(size) = parse_override(&lookup, "REGION_MAP_BATCH_SIZE") {
            acquisition.batch_size = size;
        }
        if let Some(concurrency) = parse_override(&lookup, "REGION_MAP_CONCURRENCY") {
            acquisition.concurrency = concurrency;
        }
    }

    /// Returns `true` if counties of this state are never queried.
    #[must_use]
    pub fn is_excluded(&self, state_fips: &str) -> bool {
        self.excluded_state_fips.iter().any(|f| f == state_fips)
    }
}

fn parse_override<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    raw.trim().parse().map_or_else(
        |_| {
            log::warn!("Ignoring {key}={raw:?}: not a valid number");
            None
        },
        Some,
    )
}
