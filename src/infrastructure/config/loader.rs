use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid currency: {0:?}. Must be a 3-letter ISO 4217 code")]
    InvalidCurrency(String),

    #[error("Brand cannot be empty")]
    EmptyBrand,

    #[error("Render key cannot be empty")]
    EmptyRenderKey,

    #[error("Invalid idle_ttl_secs: 0. Must be at least 1 or unset")]
    InvalidIdleTtl,

    #[error("Model type identifier cannot be empty")]
    EmptyModelType,

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. eecommerce.yaml (deployment config)
    /// 3. eecommerce.local.yaml (local overrides, optional)
    /// 4. Environment variables (EECOMMERCE_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file("eecommerce.yaml"))
            .merge(Yaml::file("eecommerce.local.yaml"))
            .merge(Env::prefixed("EECOMMERCE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let currency = &config.tracker.currency;
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ConfigError::InvalidCurrency(currency.clone()));
        }

        if config.tracker.brand.trim().is_empty() {
            return Err(ConfigError::EmptyBrand);
        }

        if config.models.iter().any(|model| model.trim().is_empty()) {
            return Err(ConfigError::EmptyModelType);
        }

        if config.registry.idle_ttl_secs == Some(0) {
            return Err(ConfigError::InvalidIdleTtl);
        }

        if config.middleware.render_key.is_empty() {
            return Err(ConfigError::EmptyRenderKey);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        Ok(())
    }
}
