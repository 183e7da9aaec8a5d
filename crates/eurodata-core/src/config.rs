//! Configuration for the query engine and provider fetchers

use crate::error::{DataError, Result};
use eurodata_utils::{env_flag, env_opt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// ECB Data Portal REST root
pub const DEFAULT_ECB_BASE_URL: &str = "https://data-api.ecb.europa.eu/service";
/// Eurostat dissemination API root
pub const DEFAULT_EUROSTAT_BASE_URL: &str =
    "https://ec.europa.eu/eurostat/api/dissemination/statistics/1.0/data";

/// Configuration for interpretation and fetching
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// ECB base URL; requests go to `{base}/data/{flow}/{series}`
    pub ecb_base_url: String,

    /// Eurostat base URL; requests go to `{base}/{dataset}`
    pub eurostat_base_url: String,

    /// Fixed per-request network timeout
    pub request_timeout: Duration,

    /// Requests per minute allowed through the shared HTTP session
    pub requests_per_minute: u32,

    /// Directory holding cached tables
    pub cache_dir: PathBuf,

    /// Whether cached tables are read before fetching
    pub cache_enabled: bool,

    /// Model used by the optional classifier and summariser
    pub model: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            ecb_base_url: DEFAULT_ECB_BASE_URL.to_string(),
            eurostat_base_url: DEFAULT_EUROSTAT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            requests_per_minute: 60,
            cache_dir: PathBuf::from("data/cache"),
            cache_enabled: true,
            model: "gpt-4o-mini".to_string(),
        }
    }
}

impl DataConfig {
    /// Create a new configuration builder
    pub fn builder() -> DataConfigBuilder {
        DataConfigBuilder::default()
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env().build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for base in [&self.ecb_base_url, &self.eurostat_base_url] {
            let parsed = url::Url::parse(base)?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(DataError::ConfigError(format!(
                    "base URL must be http(s): {base}"
                )));
            }
        }

        if self.request_timeout.is_zero() {
            return Err(DataError::ConfigError(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.requests_per_minute == 0 {
            return Err(DataError::ConfigError(
                "requests_per_minute must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for DataConfig
#[derive(Debug, Default)]
pub struct DataConfigBuilder {
    ecb_base_url: Option<String>,
    eurostat_base_url: Option<String>,
    request_timeout: Option<Duration>,
    requests_per_minute: Option<u32>,
    cache_dir: Option<PathBuf>,
    cache_enabled: Option<bool>,
    model: Option<String>,
}

impl DataConfigBuilder {
    /// Set the ECB base URL
    pub fn ecb_base_url(mut self, url: impl Into<String>) -> Self {
        self.ecb_base_url = Some(url.into());
        self
    }

    /// Set the Eurostat base URL
    pub fn eurostat_base_url(mut self, url: impl Into<String>) -> Self {
        self.eurostat_base_url = Some(url.into());
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the HTTP session quota
    pub fn requests_per_minute(mut self, rpm: u32) -> Self {
        self.requests_per_minute = Some(rpm);
        self
    }

    /// Set the cache directory
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// Enable or disable cache reads
    pub fn cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = Some(enabled);
        self
    }

    /// Set the model name
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Fill unset fields from the environment
    ///
    /// Reads `ECB_BASE_URL`, `EUROSTAT_BASE_URL`, `EURODATA_TIMEOUT_SECS`,
    /// `EURODATA_CACHE_DIR`, `EURODATA_CACHE` and `OPENAI_MODEL`.
    pub fn with_env(mut self) -> Self {
        if self.ecb_base_url.is_none() {
            self.ecb_base_url = env_opt("ECB_BASE_URL");
        }
        if self.eurostat_base_url.is_none() {
            self.eurostat_base_url = env_opt("EUROSTAT_BASE_URL");
        }
        if self.request_timeout.is_none() {
            self.request_timeout = env_opt("EURODATA_TIMEOUT_SECS")
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
        }
        if self.cache_dir.is_none() {
            self.cache_dir = env_opt("EURODATA_CACHE_DIR").map(PathBuf::from);
        }
        if self.cache_enabled.is_none() {
            self.cache_enabled = env_flag("EURODATA_CACHE");
        }
        if self.model.is_none() {
            self.model = env_opt("OPENAI_MODEL");
        }
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<DataConfig> {
        let defaults = DataConfig::default();

        let config = DataConfig {
            ecb_base_url: trim_slash(self.ecb_base_url.unwrap_or(defaults.ecb_base_url)),
            eurostat_base_url: trim_slash(
                self.eurostat_base_url.unwrap_or(defaults.eurostat_base_url),
            ),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            requests_per_minute: self
                .requests_per_minute
                .unwrap_or(defaults.requests_per_minute),
            cache_dir: self.cache_dir.unwrap_or(defaults.cache_dir),
            cache_enabled: self.cache_enabled.unwrap_or(defaults.cache_enabled),
            model: self.model.unwrap_or(defaults.model),
        };

        config.validate()?;
        Ok(config)
    }
}

fn trim_slash(url: String) -> String {
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DataConfig::default();
        assert_eq!(config.ecb_base_url, DEFAULT_ECB_BASE_URL);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.cache_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = DataConfig::builder()
            .ecb_base_url("http://localhost:8080/service/")
            .cache_enabled(false)
            .request_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.ecb_base_url, "http://localhost:8080/service");
        assert!(!config.cache_enabled);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_validation_rejects_bad_url() {
        let result = DataConfig::builder().eurostat_base_url("not a url").build();
        assert!(matches!(result, Err(DataError::ConfigError(_))));

        let result = DataConfig::builder().ecb_base_url("ftp://ecb.example").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_validation_rejects_zero_quota() {
        let config = DataConfig {
            requests_per_minute: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
