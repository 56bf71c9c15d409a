//! Configuration management for caststats
//!
//! Settings come from a YAML file, then environment overrides, then
//! validation. Every section has working defaults so an empty file (or no
//! file at all) yields a usable configuration.

pub mod loader;
pub mod settings;
pub mod validation;

pub use loader::{ConfigError, ConfigLoader, CONFIG_PATH_ENV};
pub use settings::{
    CacheSettings, Config, FetchSettings, GraphProvider, GraphSettings, LoggingSettings,
    PostsProvider, PostsSettings,
};
