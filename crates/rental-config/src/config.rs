//! Configuration management for the rental client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API base URL (can be overridden at compile time via RENTAL_API_URL env var).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("RENTAL_API_URL") {
    Some(url) => url,
    None => "http://localhost:5000",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default look-ahead applied when deciding whether an access token is expired.
pub const DEFAULT_EXPIRY_SKEW_SECS: u64 = 300;

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the listing API.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Tokens expiring within this many seconds are refreshed proactively.
    #[serde(default = "default_expiry_skew_secs")]
    pub expiry_skew_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_expiry_skew_secs() -> u64 {
    DEFAULT_EXPIRY_SKEW_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            expiry_skew_secs: DEFAULT_EXPIRY_SKEW_SECS,
        }
    }
}

impl Config {
    /// Load configuration from the config file if present, then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production). Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(level) = lookup("RENTAL_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = lookup("RENTAL_API_URL") {
            self.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(raw) = lookup("RENTAL_REQUEST_TIMEOUT_SECS") {
            match raw.trim().parse() {
                Ok(secs) => self.request_timeout_secs = secs,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid RENTAL_REQUEST_TIMEOUT_SECS"),
            }
        }
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> CoreResult<()> {
        self.api_url()?;
        if self.request_timeout_secs == 0 {
            return Err(CoreError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Token expiry look-ahead in milliseconds.
    pub fn expiry_skew_ms(&self) -> i64 {
        i64::try_from(self.expiry_skew_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }
}
