//! Error types and utilities for caststats

use thiserror::Error;

/// Result type alias for caststats operations
pub type Result<T> = std::result::Result<T, CastStatsError>;

/// Main error type for caststats operations
#[derive(Error, Debug)]
pub enum CastStatsError {
    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Network related errors (client construction, exhausted fetches)
    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The caller did not supply a usable user identifier
    #[error("Missing input: no user identifier (fid) was supplied")]
    MissingInput,
}

impl CastStatsError {
    /// Create a new configuration error with source
    pub fn config_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new network error with source
    pub fn network_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this error means the caller forgot the identifier
    pub fn is_missing_input(&self) -> bool {
        matches!(self, Self::MissingInput)
    }
}
