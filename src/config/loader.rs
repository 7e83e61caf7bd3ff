//! Configuration loader

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use std::path::{Path, PathBuf};

use super::types::{AppConfig, KalshiConfig};
use crate::common::errors::{ClientError, Result};

pub const API_KEY_ENV: &str = "KALSHI_API_KEY";
pub const PRIVATE_KEY_PATH_ENV: &str = "KALSHI_PRIVATE_KEY_PATH";
pub const API_BASE_ENV: &str = "KALSHI_API_BASE";

/// The conventional Kalshi variables, which win over every other source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KalshiEnv {
    pub api_key: Option<String>,
    pub private_key_path: Option<String>,
    pub api_base: Option<String>,
}

impl KalshiEnv {
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            api_key: read(API_KEY_ENV),
            private_key_path: read(PRIVATE_KEY_PATH_ENV),
            api_base: read(API_BASE_ENV),
        }
    }
}

/// Load configuration from file and environment variables
///
/// Priority (highest to lowest):
/// 1. `KALSHI_API_KEY`, `KALSHI_PRIVATE_KEY_PATH`, `KALSHI_API_BASE`
/// 2. Environment variables (prefixed with APP__, e.g. `APP__KALSHI__RETRY__MAX_ATTEMPTS`)
/// 3. Configuration file (TOML format)
/// 4. Default values
pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    load_with_env(config_path, KalshiEnv::from_env())
}

/// Load configuration with explicit Kalshi overrides
pub fn load_with_env(config_path: Option<&str>, kalshi_env: KalshiEnv) -> Result<AppConfig> {
    let mut builder = Config::builder();

    if let Some(path) = config_path {
        if Path::new(path).exists() {
            builder = builder.add_source(File::with_name(path).required(false));
        }
    }

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    builder = apply_kalshi_env(builder, kalshi_env)?;

    let config = builder
        .build()
        .map_err(|e| ClientError::Configuration(e.to_string()))?;

    config
        .try_deserialize()
        .map_err(|e| ClientError::Configuration(e.to_string()))
}

fn apply_kalshi_env(
    builder: ConfigBuilder<DefaultState>,
    kalshi_env: KalshiEnv,
) -> Result<ConfigBuilder<DefaultState>> {
    let to_config_err = |e: config::ConfigError| ClientError::Configuration(e.to_string());

    builder
        .set_override_option("kalshi.api_key", kalshi_env.api_key)
        .and_then(|b| {
            b.set_override_option("kalshi.private_key_path", kalshi_env.private_key_path)
        })
        .and_then(|b| b.set_override_option("kalshi.rest_url", kalshi_env.api_base))
        .map_err(to_config_err)
}

/// Load configuration from environment variables only
pub fn load_from_env() -> Result<AppConfig> {
    // Try to load from .env file
    dotenvy::dotenv().ok();

    Ok(config_from_env(KalshiEnv::from_env()))
}

/// Defaults with the Kalshi variables applied on top
pub fn config_from_env(kalshi_env: KalshiEnv) -> AppConfig {
    let defaults = KalshiConfig::default();

    AppConfig {
        kalshi: KalshiConfig {
            api_key: kalshi_env.api_key,
            private_key_path: kalshi_env
                .private_key_path
                .unwrap_or_else(|| defaults.private_key_path.clone()),
            rest_url: kalshi_env.api_base.unwrap_or_else(|| defaults.rest_url.clone()),
            ..defaults
        },
        settings: super::types::AppSettings::default(),
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (path, home) {
        ("~", Some(home)) => home,
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}
