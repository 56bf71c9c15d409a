//! Structured logging infrastructure for caststats

use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

type InitResult = std::result::Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "caststats_fetch=debug")
    pub level: String,
    /// Emit one JSON object per event
    pub json_format: bool,
    /// Multi-line human readable output with colors
    pub pretty_format: bool,
    /// Optional file path for log output (appended to); stderr otherwise
    pub file_path: Option<String>,
    /// Whether to log span open/close events
    pub include_spans: bool,
    /// Whether to include target module information
    pub include_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            pretty_format: false,
            file_path: None,
            include_spans: false,
            include_targets: true,
        }
    }
}

impl LoggingConfig {
    /// Build a filter, falling back to `info` when the directive does not parse
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.level).unwrap_or_else(|_| EnvFilter::new("info"))
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Initialize the tracing subscriber with the given configuration
///
/// Fails if a global subscriber is already installed or the log file cannot
/// be opened.
pub fn init_logging(config: LoggingConfig) -> InitResult {
    let registry = tracing_subscriber::registry().with(config.env_filter());
    let span_events = config.span_events();

    let file = match &config.file_path {
        Some(path) => Some(Mutex::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
        None => None,
    };

    if config.json_format {
        let layer = fmt::layer()
            .json()
            .with_span_events(span_events)
            .with_target(config.include_targets)
            .with_current_span(config.include_spans);

        match file {
            Some(file) => registry.with(layer.with_writer(file)).try_init()?,
            None => registry.with(layer.with_writer(std::io::stderr)).try_init()?,
        }
    } else if config.pretty_format {
        let layer = fmt::layer()
            .pretty()
            .with_span_events(span_events)
            .with_target(config.include_targets);

        match file {
            Some(file) => registry.with(layer.with_ansi(false).with_writer(file)).try_init()?,
            None => registry.with(layer.with_writer(std::io::stderr)).try_init()?,
        }
    } else {
        let layer = fmt::layer()
            .compact()
            .with_span_events(span_events)
            .with_target(config.include_targets);

        match file {
            Some(file) => registry.with(layer.with_ansi(false).with_writer(file)).try_init()?,
            None => registry.with(layer.with_writer(std::io::stderr)).try_init()?,
        }
    }

    tracing::debug!(level = %config.level, json = config.json_format, "Logging initialized");
    Ok(())
}

/// Initialize logging with default configuration
pub fn init_default_logging() -> InitResult {
    init_logging(LoggingConfig::default())
}
