//! Configuration loading utilities

use crate::Config;
use caststats_common::CastStatsError;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "CASTSTATS_CONFIG_PATH";

const DEFAULT_FILES: [&str; 2] = ["caststats.yaml", "caststats.yml"];

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error when reading configuration file
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Configuration validation error
    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Environment variable parsing error
    #[error("Failed to parse environment variable '{var}': {message}")]
    EnvParse { var: String, message: String },
}

impl From<ConfigError> for CastStatsError {
    fn from(err: ConfigError) -> Self {
        CastStatsError::config_with_source("Configuration loading error", err)
    }
}

/// Configuration loader for the application
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file with environment variable overrides
    pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        debug!("Read configuration from {}", path.as_ref().display());
        Self::from_yaml_with_env(&content, |var| env::var(var).ok())
    }

    /// Load from the explicit path variable, a default file, or defaults
    pub fn load() -> Result<Config, ConfigError> {
        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            return Self::load_config(config_path);
        }

        if let Some(path) = DEFAULT_FILES.iter().find(|p| Path::new(p).exists()) {
            return Self::load_config(path);
        }

        info!("No configuration file found, using defaults with environment overrides");
        let mut config = Config::default();
        Self::apply_env_overrides(&mut config, |var| env::var(var).ok())?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        Self::load_config(path)
    }

    /// Parse YAML, apply overrides from `lookup`, and validate
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml_with_env<F>(content: &str, lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: Config = if content.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(content)?
        };

        Self::apply_env_overrides(&mut config, lookup)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Provider selection
        if let Some(provider) = lookup("CASTSTATS_POSTS_PROVIDER") {
            config.posts.provider = parse_var("CASTSTATS_POSTS_PROVIDER", &provider)?;
        }

        if let Some(url) = lookup("CASTSTATS_POSTS_URL") {
            config.posts.base_url = Some(url);
        }

        if let Some(provider) = lookup("CASTSTATS_GRAPH_PROVIDER") {
            config.graph.provider = parse_var("CASTSTATS_GRAPH_PROVIDER", &provider)?;
        }

        if let Some(url) = lookup("CASTSTATS_GRAPH_URL") {
            config.graph.base_url = Some(url);
        }

        // Credentials
        if let Some(key) = lookup("HUB_API_KEY") {
            if config.posts.provider == crate::PostsProvider::Hub {
                config.posts.api_key = Some(key);
            }
        }

        if let Some(key) = lookup("NEYNAR_API_KEY") {
            if config.posts.provider == crate::PostsProvider::Neynar && config.posts.api_key.is_none() {
                config.posts.api_key = Some(key.clone());
            }
            if config.graph.provider == crate::GraphProvider::Neynar && config.graph.api_key.is_none() {
                config.graph.api_key = Some(key);
            }
        }

        // Fetch tuning
        if let Some(attempts) = lookup("CASTSTATS_MAX_ATTEMPTS") {
            config.fetch.max_attempts = parse_var("CASTSTATS_MAX_ATTEMPTS", &attempts)?;
        }

        if let Some(timeout) = lookup("CASTSTATS_ATTEMPT_TIMEOUT_MS") {
            config.fetch.attempt_timeout_ms = parse_var("CASTSTATS_ATTEMPT_TIMEOUT_MS", &timeout)?;
        }

        // Cache
        if let Some(ttl) = lookup("CASTSTATS_CACHE_TTL_SECS") {
            config.cache.ttl_secs = parse_var("CASTSTATS_CACHE_TTL_SECS", &ttl)?;
        }

        // Logging
        if let Some(level) = lookup("CASTSTATS_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(())
    }
}

fn parse_var<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::EnvParse {
        var: var.to_string(),
        message: e.to_string(),
    })
}
