//! # caststats common
//!
//! Shared domain types, the workspace error type and the logging bootstrap
//! used by every other crate in the caststats workspace.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod logging;
pub mod types;

pub use error::{CastStatsError, Result};
pub use logging::{init_default_logging, init_logging, LoggingConfig};
pub use types::*;
