//! Configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::loader::expand_home;
use crate::kalshi::auth::SaltLength;
use crate::kalshi::retry::{RetryConfig, RetryPolicy};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Kalshi-specific configuration
    #[serde(default)]
    pub kalshi: KalshiConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// Kalshi platform configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KalshiConfig {
    /// API key id sent in the access-key header
    #[serde(default)]
    pub api_key: Option<String>,
    /// PEM private key file; a leading `~` is expanded
    #[serde(default = "default_private_key_path")]
    pub private_key_path: String,
    /// Base URL for the REST API, including the `/trade-api/v2` prefix
    #[serde(default = "default_kalshi_rest_url")]
    pub rest_url: String,
    /// Minimum spacing between any two outbound requests
    #[serde(default = "default_min_request_interval")]
    pub min_request_interval_ms: u64,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// RSA-PSS salt length (`max` or `digest`)
    #[serde(default)]
    pub salt_length: SaltLength,
    #[serde(default)]
    pub retry: RetrySettings,
}

impl Default for KalshiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            private_key_path: default_private_key_path(),
            rest_url: default_kalshi_rest_url(),
            min_request_interval_ms: default_min_request_interval(),
            request_timeout_seconds: default_request_timeout(),
            salt_length: SaltLength::default(),
            retry: RetrySettings::default(),
        }
    }
}

impl KalshiConfig {
    /// Private key path with `~` expanded
    pub fn resolved_private_key_path(&self) -> PathBuf {
        expand_home(&self.private_key_path)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry.policy()
    }
}

fn default_private_key_path() -> String {
    "~/.trading_keys/kalshi_private_key.pem".to_string()
}

fn default_kalshi_rest_url() -> String {
    crate::kalshi::rest::DEFAULT_BASE_URL.to_string()
}

fn default_min_request_interval() -> u64 {
    150
}

fn default_request_timeout() -> u64 {
    30
}

/// Backoff settings for rate-limited and transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Delay before the first retry in milliseconds; doubles per retry
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// Total attempts per call, the first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Upper bound for any single delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_attempts: default_max_attempts(),
            max_delay_ms: default_max_delay(),
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(RetryConfig {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        })
    }
}

fn default_base_delay() -> u64 {
    500
}

fn default_max_attempts() -> u32 {
    4
}

fn default_max_delay() -> u64 {
    30_000
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.kalshi.api_key, None);
        assert_eq!(
            config.kalshi.rest_url,
            "https://api.elections.kalshi.com/trade-api/v2"
        );
        assert_eq!(config.kalshi.min_request_interval(), Duration::from_millis(150));
        assert_eq!(config.kalshi.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.kalshi.salt_length, SaltLength::Max);
        assert_eq!(config.kalshi.retry_policy(), RetryPolicy::default());
        assert_eq!(config.settings.log_level, "info");
    }

    #[test]
    fn test_partial_kalshi_section() {
        let config: AppConfig = serde_json::from_str(
            r#"{"kalshi": {"api_key": "abc", "salt_length": "digest", "retry": {"max_attempts": 2}}}"#,
        )
        .unwrap();

        assert_eq!(config.kalshi.api_key.as_deref(), Some("abc"));
        assert_eq!(config.kalshi.salt_length, SaltLength::Digest);
        assert_eq!(config.kalshi.retry.max_attempts, 2);
        assert_eq!(config.kalshi.retry.base_delay_ms, 500);
        assert_eq!(config.kalshi.min_request_interval_ms, 150);
    }
}
