//! Stats aggregation for the cast stats frame
//!
//! [`StatsAggregator`] asks a post source and a graph source concurrently and
//! reconciles whatever they return into a [`StatsRecord`](caststats_common::StatsRecord).
//! [`StatsService`] assembles the whole pipeline from configuration.

pub mod aggregator;
pub mod service;

pub use aggregator::{fallback_follow_counts, reconcile, GraphSource, PostSource, StatsAggregator};
pub use service::{retry_policy, StatsService};
