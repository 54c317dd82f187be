//! Configuration module for the explorer client and comparison sessions
//!
//! Defaults come from utils/constants.rs; environment variables override
//! them. No hardcoded values in this file.

use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::{
    API_DELAY_MS, CACHE_SCHEMA_VERSION, DEFAULT_CACHE_TTL_SECS, DEFAULT_CHAIN_ID,
    DEFAULT_HTTP_TIMEOUT_SECS, ETHERSCAN_API_URL, INITIAL_RETRY_DELAY_MS, MAX_RATE_LIMIT_WAITS,
    MAX_RETRIES, MAX_RETRY_DELAY_MS, RETRY_BACKOFF_MULTIPLIER,
};

/// Retry and backoff tuning
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Outer attempts per logical request
    pub max_retries: u32,
    /// Rate-limit waits per logical request (these do not consume attempts)
    pub max_rate_limit_waits: u32,
    /// First backoff delay
    pub initial_backoff: Duration,
    /// Backoff cap
    pub max_backoff: Duration,
    /// Multiplicative growth applied after every backoff sleep
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            max_rate_limit_waits: MAX_RATE_LIMIT_WAITS,
            initial_backoff: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
            max_backoff: Duration::from_millis(MAX_RETRY_DELAY_MS),
            multiplier: RETRY_BACKOFF_MULTIPLIER,
        }
    }
}

/// Configuration for the explorer client, cache and session defaults
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Explorer API endpoint
    pub base_url: String,
    /// Initial active chain identifier
    pub chain_id: String,
    /// Primary credential
    pub primary_key: Option<String>,
    /// Fallback credentials, tried in order after the primary
    pub fallback_keys: Vec<String>,
    /// Minimum spacing between any two outbound calls
    pub min_spacing: Duration,
    /// Retry tuning
    pub retry: RetryConfig,
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    /// Maximum cache entry age
    pub cache_ttl: Duration,
    /// Cache schema version tag
    pub cache_version: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: ETHERSCAN_API_URL.to_string(),
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            primary_key: None,
            fallback_keys: Vec::new(),
            min_spacing: Duration::from_millis(API_DELAY_MS),
            retry: RetryConfig::default(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            cache_version: CACHE_SCHEMA_VERSION.to_string(),
        }
    }
}

impl ExplorerConfig {
    /// Build configuration from environment variables.
    ///
    /// | Variable | Meaning |
    /// |---|---|
    /// | `ETHERSCAN_API_KEY` | primary key |
    /// | `ETHERSCAN_FALLBACK_KEYS` | comma separated fallback keys |
    /// | `CODEDIFF_API_URL` | explorer endpoint |
    /// | `CODEDIFF_CHAIN_ID` | initial chain |
    /// | `CODEDIFF_MIN_SPACING_MS` | rate gate spacing |
    /// | `CODEDIFF_MAX_RETRIES` | outer attempts |
    /// | `CODEDIFF_CACHE_TTL_SECS` | cache TTL |
    pub fn from_env() -> AppResult<Self> {
        let mut config = Self::default();

        // Key is NEVER logged
        if let Some(key) = non_empty_env("ETHERSCAN_API_KEY") {
            info!("🔑 ETHERSCAN_API_KEY configured (key hidden)");
            config.primary_key = Some(key);
        }
        if let Some(keys) = non_empty_env("ETHERSCAN_FALLBACK_KEYS") {
            config.fallback_keys = parse_key_list(&keys);
            info!("🔑 {} fallback keys configured", config.fallback_keys.len());
        }
        if let Some(url) = non_empty_env("CODEDIFF_API_URL") {
            config.base_url = url;
        }
        if let Some(chain_id) = non_empty_env("CODEDIFF_CHAIN_ID") {
            config.chain_id = chain_id;
        }
        if let Some(ms) = non_empty_env("CODEDIFF_MIN_SPACING_MS") {
            config.min_spacing =
                Duration::from_millis(parse_number("CODEDIFF_MIN_SPACING_MS", &ms)?);
        }
        if let Some(n) = non_empty_env("CODEDIFF_MAX_RETRIES") {
            config.retry.max_retries = parse_number("CODEDIFF_MAX_RETRIES", &n)?;
        }
        if let Some(secs) = non_empty_env("CODEDIFF_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(parse_number("CODEDIFF_CACHE_TTL_SECS", &secs)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Configured key pool in order: primary first, then fallbacks
    pub fn configured_keys(&self) -> Vec<String> {
        self.primary_key
            .iter()
            .chain(self.fallback_keys.iter())
            .filter(|k| !k.is_empty())
            .cloned()
            .collect()
    }

    /// Reject values that would make the retry loop meaningless
    pub fn validate(&self) -> AppResult<()> {
        if self.retry.max_retries == 0 {
            return Err(AppError::invalid_config("max_retries must be at least 1"));
        }
        if self.retry.multiplier < 1.0 {
            return Err(AppError::invalid_config("backoff multiplier must be >= 1.0"));
        }
        if self.retry.initial_backoff > self.retry.max_backoff {
            return Err(AppError::invalid_config("initial backoff exceeds max backoff"));
        }
        if self.chain_id.trim().is_empty() {
            return Err(AppError::invalid_config("chain id must not be empty"));
        }
        Ok(())
    }
}

/// Split a comma separated key list, trimming and dropping blanks
pub fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && v != "YOUR_API_KEY")
}

fn parse_number<T: FromStr>(name: &str, raw: &str) -> AppResult<T> {
    raw.parse::<T>()
        .map_err(|_| AppError::invalid_config(format!("{} must be a number, got {:?}", name, raw)))
}
