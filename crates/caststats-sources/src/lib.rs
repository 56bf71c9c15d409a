//! Stats source adapters for caststats
//!
//! Each adapter asks one upstream provider for one figure about one user and
//! answers with a [`SourceResult`](caststats_common::SourceResult), never an
//! error. [`CachedSource`] layers the shared [`ResultCache`] over any adapter.

pub mod cache;
pub mod hub;
pub mod neynar;
pub mod pagination;
pub mod parse;
pub mod source;
pub mod warpcast;

pub use cache::{CacheKey, CacheMetrics, CacheValue, CachedResult, ResultCache, DEFAULT_TTL};
pub use hub::HubCastSource;
pub use neynar::{NeynarCastSource, NeynarGraphSource};
pub use pagination::{count_pages, Page};
pub use source::{CachedSource, StatsSource};
pub use warpcast::WarpcastGraphSource;
