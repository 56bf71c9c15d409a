//! The source abstraction and its caching decorator

use crate::cache::{CacheKey, CacheValue, ResultCache};
use async_trait::async_trait;
use caststats_common::{Fid, SourceResult, SourceTag};
use std::sync::Arc;
use tracing::{debug, instrument};

/// One upstream answer for one user
///
/// Implementations never fail: transport, retry and parse problems surface as
/// [`SourceResult::Unavailable`] or [`SourceResult::EstimatedCount`].
#[async_trait]
pub trait StatsSource: Send + Sync {
    type Output: CacheValue;

    /// Provider identity, used for cache keys and logs
    fn tag(&self) -> SourceTag;

    async fn resolve(&self, fid: Fid) -> SourceResult<Self::Output>;
}

#[async_trait]
impl<S> StatsSource for Arc<S>
where
    S: StatsSource + ?Sized,
{
    type Output = S::Output;

    fn tag(&self) -> SourceTag {
        (**self).tag()
    }

    async fn resolve(&self, fid: Fid) -> SourceResult<Self::Output> {
        (**self).resolve(fid).await
    }
}

/// Serves live cache entries without touching the network and writes fresh
/// results back
pub struct CachedSource<S> {
    inner: S,
    cache: Arc<ResultCache>,
}

impl<S: StatsSource> CachedSource<S> {
    pub fn new(inner: S, cache: Arc<ResultCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> Arc<ResultCache> {
        Arc::clone(&self.cache)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: StatsSource> StatsSource for CachedSource<S> {
    type Output = S::Output;

    fn tag(&self) -> SourceTag {
        self.inner.tag()
    }

    #[instrument(skip(self), fields(source = %self.inner.tag()))]
    async fn resolve(&self, fid: Fid) -> SourceResult<Self::Output> {
        let key = CacheKey::new(fid, self.inner.tag());

        if let Some(cached) = self.cache.get(&key).and_then(<S::Output as CacheValue>::from_cached) {
            debug!("Serving {} for fid {} from cache", cached.kind(), fid);
            return cached;
        }

        let result = self.inner.resolve(fid).await;
        self.cache.put(key, <S::Output as CacheValue>::into_cached(result.clone()));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts resolutions and answers from a fixed result
    struct CountingSource {
        calls: AtomicUsize,
        result: SourceResult<u64>,
    }

    impl CountingSource {
        fn new(result: SourceResult<u64>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result,
            }
        }
    }

    #[async_trait]
    impl StatsSource for CountingSource {
        type Output = u64;

        fn tag(&self) -> SourceTag {
            SourceTag::HubCasts
        }

        async fn resolve(&self, _fid: Fid) -> SourceResult<u64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn fid(raw: u64) -> Fid {
        Fid::new(raw).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_lookup_within_ttl_is_served_from_cache() {
        let inner = Arc::new(CountingSource::new(SourceResult::real(42)));
        let cached = CachedSource::new(Arc::clone(&inner), Arc::new(ResultCache::default()));

        let first = cached.resolve(fid(12345)).await;
        let second = cached.resolve(fid(12345)).await;

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_after_expiry_refetches_once() {
        let inner = Arc::new(CountingSource::new(SourceResult::real(42)));
        let cache = Arc::new(ResultCache::new(Duration::from_secs(300)));
        let cached = CachedSource::new(Arc::clone(&inner), cache);

        cached.resolve(fid(1)).await;
        tokio::time::advance(Duration::from_secs(301)).await;
        cached.resolve(fid(1)).await;
        cached.resolve(fid(1)).await;

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_results_are_retried() {
        let inner = Arc::new(CountingSource::new(SourceResult::Unavailable));
        let cached = CachedSource::new(Arc::clone(&inner), Arc::new(ResultCache::default()));

        assert_eq!(cached.resolve(fid(3)).await, SourceResult::Unavailable);
        assert_eq!(cached.resolve(fid(3)).await, SourceResult::Unavailable);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert!(cached.cache().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_decorator_keeps_inner_tag() {
        let cached = CachedSource::new(
            CountingSource::new(SourceResult::real(1)),
            Arc::new(ResultCache::default()),
        );
        assert_eq!(cached.tag(), SourceTag::HubCasts);
        assert_eq!(cached.inner().tag(), SourceTag::HubCasts);
    }
}
