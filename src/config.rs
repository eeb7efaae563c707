//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every key has a default, so a partial file (or no file at all) still
//! produces a usable configuration. The weather API key is referenced by
//! env-var name and resolved at runtime.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub location: LocationConfig,
    pub history: HistoryConfig,
    pub sports: SportsConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub forecast_days: u8,
    /// Per-request timeout. Absent means requests may hang indefinitely.
    pub request_timeout_secs: Option<u64>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.weatherapi.com/v1".to_string(),
            api_key_env: "WEATHERAPI_KEY".to_string(),
            forecast_days: 7,
            request_timeout_secs: None,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<SecretString> {
        AppConfig::resolve_env(&self.api_key_env).map(SecretString::new)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LocationConfig {
    /// Used on first load and whenever IP lookup cannot name a city.
    pub default: String,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            default: "New York".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HistoryConfig {
    /// How many preceding calendar days to request per cycle.
    pub days: u32,
    /// Maximum number of days kept in the historical window.
    pub window: usize,
    pub reset_on_location_change: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            days: 7,
            window: 7,
            reset_on_location_change: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SportsConfig {
    pub enabled: bool,
    pub feed_url: String,
    pub limit: u32,
}

impl Default for SportsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            feed_url: "https://jsonplaceholder.typicode.com/posts".to_string(),
            limit: 4,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "nimbus=info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    /// The flag reports whether the file was found.
    pub fn load_or_default(path: &str) -> Result<(Self, bool)> {
        if Path::new(path).exists() {
            Ok((Self::load(path)?, true))
        } else {
            Ok((Self::default(), false))
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
