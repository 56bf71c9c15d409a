//! TTL-bounded result cache shared by every source lookup

use caststats_common::{Fid, FollowCounts, SourceResult, SourceTag};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument};

/// Default lifetime of a cached result
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Identifies one provider's answer for one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fid: Fid,
    pub source: SourceTag,
}

impl CacheKey {
    pub fn new(fid: Fid, source: SourceTag) -> Self {
        Self { fid, source }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.fid)
    }
}

/// Cached source results, one variant per source output type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedResult {
    PostCount(SourceResult<u64>),
    FollowCounts(SourceResult<FollowCounts>),
}

impl CachedResult {
    /// Only real counts are worth keeping. Estimates come from a partial or
    /// failed upstream answer and must be retried on the next request.
    pub fn is_cacheable(&self) -> bool {
        match self {
            CachedResult::PostCount(result) => result.is_real(),
            CachedResult::FollowCounts(result) => result.is_real(),
        }
    }
}

/// Conversion between a source's output and its [`CachedResult`] variant
pub trait CacheValue: Clone + Send + Sync + 'static {
    fn into_cached(result: SourceResult<Self>) -> CachedResult;

    /// `None` when the cached variant belongs to another output type
    fn from_cached(cached: CachedResult) -> Option<SourceResult<Self>>;
}

impl CacheValue for u64 {
    fn into_cached(result: SourceResult<Self>) -> CachedResult {
        CachedResult::PostCount(result)
    }

    fn from_cached(cached: CachedResult) -> Option<SourceResult<Self>> {
        match cached {
            CachedResult::PostCount(result) => Some(result),
            _ => None,
        }
    }
}

impl CacheValue for FollowCounts {
    fn into_cached(result: SourceResult<Self>) -> CachedResult {
        CachedResult::FollowCounts(result)
    }

    fn from_cached(cached: CachedResult) -> Option<SourceResult<Self>> {
        match cached {
            CachedResult::FollowCounts(result) => Some(result),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedResult,
    inserted_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// Cache performance metrics
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub expirations: AtomicU64,
    /// Writes refused because the value was not a real count
    pub rejected: AtomicU64,
    pub invalidations: AtomicU64,
}

impl CacheMetrics {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let total = hits + self.misses.load(Ordering::Relaxed) as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }

    pub fn get_stats(&self) -> HashMap<String, u64> {
        let mut stats = HashMap::new();
        stats.insert("hits".to_string(), self.hits.load(Ordering::Relaxed));
        stats.insert("misses".to_string(), self.misses.load(Ordering::Relaxed));
        stats.insert("expirations".to_string(), self.expirations.load(Ordering::Relaxed));
        stats.insert("rejected".to_string(), self.rejected.load(Ordering::Relaxed));
        stats.insert("invalidations".to_string(), self.invalidations.load(Ordering::Relaxed));
        stats
    }
}

/// Process-wide cache of source results keyed by `(fid, source)`
///
/// Entries are immutable once inserted. Expiry is lazy: an entry older than
/// the TTL is purged by the lookup that finds it. Only real counts are stored:
/// `Unavailable` and estimated results are retried on the next request.
pub struct ResultCache {
    entries: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
    metrics: Arc<CacheMetrics>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            metrics: Arc::new(CacheMetrics::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get a live entry, purging it if it has expired
    #[instrument(skip(self), fields(key = %key))]
    pub fn get(&self, key: &CacheKey) -> Option<CachedResult> {
        let now = Instant::now();

        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now, self.ttl))
            .is_some()
        {
            debug!("Cache entry expired for key: {}", key);
            self.metrics.record_expiration();
            self.metrics.record_miss();
            return None;
        }

        match self.entries.get(key) {
            Some(entry) => {
                debug!("Cache hit for key: {}", key);
                self.metrics.record_hit();
                Some(entry.value.clone())
            }
            None => {
                debug!("Cache miss for key: {}", key);
                self.metrics.record_miss();
                None
            }
        }
    }

    /// Store a result; `Unavailable` and estimated values are ignored
    #[instrument(skip(self, value), fields(key = %key))]
    pub fn put(&self, key: CacheKey, value: CachedResult) {
        if !value.is_cacheable() {
            debug!("Not caching degraded result for key: {}", key);
            self.metrics.record_rejected();
            return;
        }

        debug!("Storing result in cache for key: {}", key);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: Instant::now(),
            },
        );
    }

    /// Drop every entry for `fid`
    pub fn invalidate(&self, fid: Fid) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.fid != fid);
        let removed = before.saturating_sub(self.entries.len());

        self.metrics
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        info!("Invalidated {} cache entries for fid {}", removed, fid);
        removed
    }

    pub fn clear(&self) {
        let removed = self.entries.len();
        self.entries.clear();
        self.metrics
            .invalidations
            .fetch_add(removed as u64, Ordering::Relaxed);
        info!("Invalidated {} cache entries", removed);
    }

    /// Entries currently stored, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn metrics(&self) -> Arc<CacheMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Metric counters plus the current entry count
    pub fn stats(&self) -> HashMap<String, u64> {
        let mut stats = self.metrics.get_stats();
        stats.insert("entry_count".to_string(), self.entries.len() as u64);
        stats
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.entries.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}
