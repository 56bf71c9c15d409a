//! Application configuration structures

use caststats_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    /// Post (cast) count provider
    #[validate(nested)]
    pub posts: PostsSettings,

    /// Follower/following count provider
    #[validate(nested)]
    pub graph: GraphSettings,

    /// Retry, timeout and pacing for every upstream call
    #[validate(nested)]
    pub fetch: FetchSettings,

    /// Result cache
    #[validate(nested)]
    pub cache: CacheSettings,

    /// Logging output
    pub logging: LoggingSettings,
}

/// Which upstream answers "how many casts has this fid published"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostsProvider {
    /// A Farcaster hub's HTTP API (`/v1/castsByFid`)
    #[default]
    Hub,
    /// Neynar's user cast feed
    Neynar,
}

impl PostsProvider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            PostsProvider::Hub => "https://hub.pinata.cloud",
            PostsProvider::Neynar => "https://api.neynar.com",
        }
    }
}

impl std::str::FromStr for PostsProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hub" => Ok(PostsProvider::Hub),
            "neynar" => Ok(PostsProvider::Neynar),
            other => Err(format!("unknown posts provider '{other}' (expected hub or neynar)")),
        }
    }
}

/// Which upstream answers "how many followers / followings"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphProvider {
    /// Warpcast's public `/v2/user-by-fid`
    #[default]
    Warpcast,
    /// Neynar's `/v2/farcaster/user/bulk`
    Neynar,
}

impl GraphProvider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            GraphProvider::Warpcast => "https://api.warpcast.com",
            GraphProvider::Neynar => "https://api.neynar.com",
        }
    }
}

impl std::str::FromStr for GraphProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warpcast" => Ok(GraphProvider::Warpcast),
            "neynar" => Ok(GraphProvider::Neynar),
            other => Err(format!(
                "unknown graph provider '{other}' (expected warpcast or neynar)"
            )),
        }
    }
}

/// Post count provider configuration
#[derive(Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PostsSettings {
    pub provider: PostsProvider,

    /// Overrides the provider's public endpoint
    #[validate(url(message = "posts.base_url must be a valid URL"))]
    pub base_url: Option<String>,

    /// Bearer token for hubs, `x-api-key` for Neynar
    pub api_key: Option<String>,

    /// Items requested per page
    #[validate(range(min = 1, max = 1000, message = "posts.page_size must be between 1 and 1000"))]
    pub page_size: u32,

    /// Pages walked before reporting a truncated count
    #[validate(range(min = 1, max = 100, message = "posts.max_pages must be between 1 and 100"))]
    pub max_pages: u32,
}

impl PostsSettings {
    /// Configured base URL, or the provider's public endpoint
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

impl fmt::Debug for PostsSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostsSettings")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &redacted(&self.api_key))
            .field("page_size", &self.page_size)
            .field("max_pages", &self.max_pages)
            .finish()
    }
}

impl Default for PostsSettings {
    fn default() -> Self {
        Self {
            provider: PostsProvider::default(),
            base_url: None,
            api_key: None,
            page_size: 1000,
            max_pages: 5,
        }
    }
}

/// Follow graph provider configuration
#[derive(Clone, Default, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct GraphSettings {
    pub provider: GraphProvider,

    #[validate(url(message = "graph.base_url must be a valid URL"))]
    pub base_url: Option<String>,

    pub api_key: Option<String>,
}

impl fmt::Debug for GraphSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphSettings")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api_key", &redacted(&self.api_key))
            .finish()
    }
}

fn redacted(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "<redacted>")
}

impl GraphSettings {
    /// Configured base URL, or the provider's public endpoint
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

/// Resilient fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct FetchSettings {
    /// Attempts per call, including the first
    #[validate(range(min = 1, max = 10, message = "fetch.max_attempts must be between 1 and 10"))]
    pub max_attempts: u32,

    /// Hard timeout for a single attempt
    #[validate(range(min = 100, max = 120000, message = "fetch.attempt_timeout_ms must be between 100 and 120000"))]
    pub attempt_timeout_ms: u64,

    /// First backoff delay; doubles per retry
    #[validate(range(min = 1, max = 60000, message = "fetch.base_backoff_ms must be between 1 and 60000"))]
    pub base_backoff_ms: u64,

    #[validate(range(min = 1, max = 300000, message = "fetch.max_backoff_ms must be between 1 and 300000"))]
    pub max_backoff_ms: u64,

    /// Cool-down after a 429 that carried no Retry-After
    #[validate(range(min = 1, max = 3600, message = "fetch.rate_limit_cooldown_secs must be between 1 and 3600"))]
    pub rate_limit_cooldown_secs: u64,

    /// Ceiling on any 429 deferral, including upstream Retry-After values
    #[validate(range(min = 1, max = 3600, message = "fetch.max_retry_after_secs must be between 1 and 3600"))]
    pub max_retry_after_secs: u64,

    /// Outbound requests per second across all providers; 0 disables pacing
    pub requests_per_second: u32,

    pub user_agent: String,
}

impl FetchSettings {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.base_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempt_timeout_ms: 10_000,
            base_backoff_ms: 250,
            max_backoff_ms: 5_000,
            rate_limit_cooldown_secs: 5,
            max_retry_after_secs: 60,
            requests_per_second: 10,
            user_agent: concat!("caststats/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,

    #[validate(range(min = 1, max = 86400, message = "cache.ttl_secs must be between 1 and 86400"))]
    pub ttl_secs: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// One JSON object per line instead of human readable output
    pub json: bool,

    /// Optional log file path
    pub file: Option<String>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl LoggingSettings {
    /// Convert into the bootstrap configuration understood by `caststats-common`
    pub fn to_logging_config(&self) -> LoggingConfig {
        LoggingConfig {
            level: self.level.clone(),
            json_format: self.json,
            file_path: self.file.clone(),
            ..LoggingConfig::default()
        }
    }
}

impl Config {
    /// Comprehensive validation of the entire configuration
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        // First run the derived field validation
        self.validate()?;

        // Then the cross-field rules
        let mut errors = validator::ValidationErrors::new();

        if self.fetch.base_backoff_ms > self.fetch.max_backoff_ms {
            errors.add(
                "fetch",
                crate::validation::error(
                    "backoff_order",
                    "fetch.base_backoff_ms must not exceed fetch.max_backoff_ms",
                ),
            );
        }

        if let Err(err) = crate::validation::validate_log_level(&self.logging.level) {
            errors.add("logging", err);
        }

        for (field, url) in [
            ("posts", self.posts.base_url()),
            ("graph", self.graph.base_url()),
        ] {
            if let Err(err) = crate::validation::validate_http_url(url) {
                errors.add(field, err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
