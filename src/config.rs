//! Configuration management for the dashboard core
//!
//! Loads configuration from TOML files with environment variable substitution.

use crate::domain::ConversionRate;

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub api: ApiConfig,
    pub metrics: MetricsConfig,
    pub conversion: ConversionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub instance_id: String,
    pub health_check_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub request_timeout_ms: u64,
    /// Name of the environment variable holding the bearer token
    pub auth_token_env: Option<String>,
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConversionConfig {
    pub default_rate: i64,
    /// Minimum utility balance for `select_eligible`
    pub min_utility_for_participation: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub json: bool,
}

impl Settings {
    /// Load settings from configuration files
    pub fn load() -> Result<Self> {
        let config_path = env::var("HOTPOT_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config/default.toml"));

        Self::load_from(&config_path)
    }

    /// Load settings from an explicit path
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        Self::parse(&config_str)
    }

    fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.backend.base_url.trim().is_empty() {
            anyhow::bail!("backend.base_url must not be empty");
        }
        if self.backend.request_timeout_ms == 0 {
            anyhow::bail!("backend.request_timeout_ms must be positive");
        }
        ConversionRate::new(self.conversion.default_rate)
            .with_context(|| "conversion.default_rate is out of range")?;

        Ok(())
    }

    /// Non-fatal configuration notes, logged once the subscriber is installed
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.service.health_check_interval_secs == 0 {
            warnings.push("Health checks disabled (interval is 0)".to_string());
        }
        if self.metrics.enabled && self.metrics.port == self.api.port {
            warnings.push(format!(
                "Metrics and API both configured on port {}",
                self.api.port
            ));
        }
        warnings
    }

    /// Configured starting rate; validated on load
    pub fn default_rate(&self) -> ConversionRate {
        ConversionRate::new(self.conversion.default_rate).unwrap_or(ConversionRate::DEFAULT)
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    lazy_static::lazy_static! {
        static ref ENV_VAR: regex::Regex =
            regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("valid env var pattern");
    }

    let mut result = input.to_string();
    for cap in ENV_VAR.captures_iter(input) {
        let var_name = &cap[1];
        let var_value = env::var(var_name).unwrap_or_default();
        result = result.replace(&cap[0], &var_value);
    }

    result
}
