//! Client configuration
//!
//! [`ClientConfig`] is the runtime configuration, fixed at construction.
//! [`ClientConfigFile`] is its on-disk form (YAML or JSON) with plain integer
//! durations; [`load_config`] parses and validates it.

use crate::auth::RefreshTokenLocation;
use crate::error::{Error, Result};
use crate::http::{RateLimiterConfig, RetryPolicy};
use crate::types::{BackoffType, StringMap};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Runtime Config
// ============================================================================

/// Configuration for the API client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL for all requests
    pub base_url: String,
    /// Per-request timeout (bounded wait on the network call)
    pub timeout: Duration,
    /// Additional attempts allowed for transient failures
    pub max_retries: u32,
    /// Unit delay for backoff
    pub base_delay: Duration,
    /// Type of backoff strategy
    pub backoff_type: BackoffType,
    /// Maximum computed backoff
    pub max_backoff: Duration,
    /// Path of the credential refresh endpoint
    pub refresh_path: String,
    /// How the refresh token is sent to the refresh endpoint
    pub refresh_token_location: RefreshTokenLocation,
    /// Anti-forgery header name, used on requests and read from responses
    pub csrf_header: String,
    /// Client-side throttle; disabled when `None`
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: StringMap,
    /// User agent string
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout: Duration::from_secs(default_timeout_seconds()),
            max_retries: default_max_retries(),
            base_delay: Duration::from_millis(default_base_delay_ms()),
            backoff_type: BackoffType::Linear,
            max_backoff: Duration::from_millis(default_max_backoff_ms()),
            refresh_path: default_refresh_path(),
            refresh_token_location: RefreshTokenLocation::Body,
            csrf_header: default_csrf_header(),
            rate_limit: None,
            default_headers: StringMap::new(),
            user_agent: format!("condo-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Retry policy derived from this config
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            backoff_type: self.backoff_type,
            max_backoff: self.max_backoff,
        }
    }

    /// Build full URL from path
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    /// Whether `path` targets the refresh endpoint
    pub fn is_refresh_path(&self, path: &str) -> bool {
        let target = path.split('?').next().unwrap_or(path);
        self.url_for(target).trim_end_matches('/')
            == self.url_for(&self.refresh_path).trim_end_matches('/')
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::config("base_url cannot be empty"));
        }

        let url = url::Url::parse(&self.base_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if !self.refresh_path.starts_with('/') {
            return Err(Error::config("refresh_path must start with '/'"));
        }

        if self.timeout.is_zero() {
            return Err(Error::config("timeout must be greater than zero"));
        }

        if self.csrf_header.trim().is_empty() {
            return Err(Error::config("csrf_header cannot be empty"));
        }

        Ok(())
    }
}

/// Builder for client config
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set the base backoff delay
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.config.base_delay = delay;
        self
    }

    /// Set backoff configuration
    pub fn backoff(mut self, backoff_type: BackoffType, base: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.base_delay = base;
        self.config.max_backoff = max;
        self
    }

    /// Set the refresh endpoint path
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.config.refresh_path = path.into();
        self
    }

    /// Set how the refresh token is transmitted
    pub fn refresh_token_location(mut self, location: RefreshTokenLocation) -> Self {
        self.config.refresh_token_location = location;
        self
    }

    /// Set the anti-forgery header name
    pub fn csrf_header(mut self, name: impl Into<String>) -> Self {
        self.config.csrf_header = name.into();
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

// ============================================================================
// File Config
// ============================================================================

/// Client configuration as written in YAML/JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfigFile {
    /// Base URL for API requests
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Maximum number of retries
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retry backoff configuration
    #[serde(default)]
    pub retry_backoff: BackoffConfig,

    /// Refresh endpoint configuration
    #[serde(default)]
    pub refresh: RefreshConfig,

    /// Anti-forgery header name
    #[serde(default = "default_csrf_header")]
    pub csrf_header: String,

    /// Client-side rate limiting
    #[serde(default)]
    pub rate_limit: Option<RateLimiterConfig>,

    /// Default headers for all requests
    #[serde(default)]
    pub headers: StringMap,

    /// User agent override
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Backoff configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Type of backoff
    #[serde(rename = "type", default)]
    pub backoff_type: BackoffType,

    /// Base delay in milliseconds
    #[serde(default = "default_base_delay_ms")]
    pub base_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            backoff_type: BackoffType::default(),
            base_ms: default_base_delay_ms(),
            max_ms: default_max_backoff_ms(),
        }
    }
}

/// Refresh endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Path of the refresh endpoint
    #[serde(default = "default_refresh_path")]
    pub path: String,

    /// Where the refresh token is sent
    #[serde(default)]
    pub token_location: RefreshTokenLocation,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            path: default_refresh_path(),
            token_location: RefreshTokenLocation::default(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    60_000
}

fn default_refresh_path() -> String {
    "/auth/refresh".to_string()
}

fn default_csrf_header() -> String {
    "X-CSRF-Token".to_string()
}

impl From<ClientConfigFile> for ClientConfig {
    fn from(file: ClientConfigFile) -> Self {
        let defaults = ClientConfig::default();
        Self {
            base_url: file.base_url,
            timeout: Duration::from_secs(file.timeout_seconds),
            max_retries: file.max_retries,
            base_delay: Duration::from_millis(file.retry_backoff.base_ms),
            backoff_type: file.retry_backoff.backoff_type,
            max_backoff: Duration::from_millis(file.retry_backoff.max_ms),
            refresh_path: file.refresh.path,
            refresh_token_location: file.refresh.token_location,
            csrf_header: file.csrf_header,
            rate_limit: file.rate_limit,
            default_headers: file.headers,
            user_agent: file.user_agent.unwrap_or(defaults.user_agent),
        }
    }
}

/// Load and validate a client config from a YAML or JSON file
pub fn load_config(path: impl AsRef<Path>) -> Result<ClientConfig> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read config file '{}': {}",
            path.display(),
            e
        ))
    })?;
    load_config_from_str(&content)
}

/// Load and validate a client config from a YAML (or JSON) string
pub fn load_config_from_str(yaml: &str) -> Result<ClientConfig> {
    let file: ClientConfigFile = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse client config: {e}")))?;

    let config = ClientConfig::from(file);
    config.validate()?;
    Ok(config)
}
