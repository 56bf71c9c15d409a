//! Wiring from configuration to a ready aggregator

use crate::aggregator::{GraphSource, PostSource, StatsAggregator};
use caststats_common::{Fid, Result, StatsRecord};
use caststats_config::{Config, FetchSettings, GraphProvider, PostsProvider};
use caststats_fetch::{HttpTransport, RateGate, ReqwestTransport, ResilientFetcher, RetryPolicy};
use caststats_sources::{
    CachedSource, HubCastSource, NeynarCastSource, NeynarGraphSource, ResultCache, StatsSource,
    WarpcastGraphSource,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Retry policy described by the `fetch` section
pub fn retry_policy(settings: &FetchSettings) -> RetryPolicy {
    RetryPolicy {
        max_attempts: settings.max_attempts,
        attempt_timeout: settings.attempt_timeout(),
        base_backoff: settings.base_backoff(),
        max_backoff: settings.max_backoff(),
        rate_limit_cooldown: settings.rate_limit_cooldown(),
        max_retry_after: settings.max_retry_after(),
    }
}

/// The assembled pipeline: transport, rate gate, fetcher, cache and sources
pub struct StatsService {
    aggregator: StatsAggregator,
    cache: Option<Arc<ResultCache>>,
    gate: Arc<RateGate>,
}

impl StatsService {
    /// Build the production pipeline over a pooled HTTP client
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.fetch.user_agent)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build the pipeline over any transport
    pub fn with_transport(config: &Config, transport: Arc<dyn HttpTransport>) -> Self {
        let gate = Arc::new(RateGate::new(config.fetch.requests_per_second));
        let fetcher = ResilientFetcher::new(transport, Arc::clone(&gate), retry_policy(&config.fetch));

        let cache = config
            .cache
            .enabled
            .then(|| Arc::new(ResultCache::new(config.cache.ttl())));

        let posts = Self::post_source(config, fetcher.clone(), cache.as_ref());
        let follows = Self::graph_source(config, fetcher, cache.as_ref());

        info!(
            "Stats pipeline ready: posts via {} ({}), graph via {} ({}), cache {}",
            posts.tag(),
            config.posts.base_url(),
            follows.tag(),
            config.graph.base_url(),
            match &cache {
                Some(cache) => format!("ttl {:?}", cache.ttl()),
                None => "disabled".to_string(),
            }
        );

        Self {
            aggregator: StatsAggregator::new(posts, follows),
            cache,
            gate,
        }
    }

    fn post_source(
        config: &Config,
        fetcher: ResilientFetcher,
        cache: Option<&Arc<ResultCache>>,
    ) -> PostSource {
        let settings = &config.posts;
        match settings.provider {
            PostsProvider::Hub => with_cache(
                HubCastSource::new(fetcher, settings.base_url())
                    .with_api_key(settings.api_key.clone())
                    .with_paging(settings.page_size, settings.max_pages),
                cache,
            ),
            PostsProvider::Neynar => {
                if settings.api_key.is_none() {
                    warn!("Neynar post source configured without an API key; requests will be rejected");
                }
                with_cache(
                    NeynarCastSource::new(fetcher, settings.base_url(), settings.api_key.clone())
                        .with_paging(settings.page_size, settings.max_pages),
                    cache,
                )
            }
        }
    }

    fn graph_source(
        config: &Config,
        fetcher: ResilientFetcher,
        cache: Option<&Arc<ResultCache>>,
    ) -> GraphSource {
        let settings = &config.graph;
        match settings.provider {
            GraphProvider::Warpcast => with_cache(
                WarpcastGraphSource::new(fetcher, settings.base_url())
                    .with_api_key(settings.api_key.clone()),
                cache,
            ),
            GraphProvider::Neynar => {
                if settings.api_key.is_none() {
                    warn!("Neynar graph source configured without an API key; requests will be rejected");
                }
                with_cache(
                    NeynarGraphSource::new(fetcher, settings.base_url(), settings.api_key.clone()),
                    cache,
                )
            }
        }
    }

    pub fn aggregator(&self) -> &StatsAggregator {
        &self.aggregator
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    pub fn rate_gate(&self) -> &Arc<RateGate> {
        &self.gate
    }

    pub async fn get_stats(&self, fid: Fid) -> StatsRecord {
        self.aggregator.get_stats(fid).await
    }

    pub async fn get_stats_for(&self, raw_fid: Option<&str>) -> Result<StatsRecord> {
        self.aggregator.get_stats_for(raw_fid).await
    }

    /// Cache counters, empty when caching is disabled
    pub fn cache_stats(&self) -> HashMap<String, u64> {
        self.cache.as_ref().map(|cache| cache.stats()).unwrap_or_default()
    }
}

fn with_cache<S>(source: S, cache: Option<&Arc<ResultCache>>) -> Arc<dyn StatsSource<Output = S::Output>>
where
    S: StatsSource + 'static,
{
    match cache {
        Some(cache) => Arc::new(CachedSource::new(source, Arc::clone(cache))),
        None => Arc::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retry_policy_from_settings() {
        let settings = FetchSettings {
            max_attempts: 4,
            attempt_timeout_ms: 2500,
            base_backoff_ms: 100,
            max_backoff_ms: 800,
            rate_limit_cooldown_secs: 9,
            max_retry_after_secs: 30,
            ..FetchSettings::default()
        };

        let policy = retry_policy(&settings);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.attempt_timeout, Duration::from_millis(2500));
        assert_eq!(policy.base_backoff, Duration::from_millis(100));
        assert_eq!(policy.max_backoff, Duration::from_millis(800));
        assert_eq!(policy.rate_limit_cooldown, Duration::from_secs(9));
        assert_eq!(policy.max_retry_after, Duration::from_secs(30));
    }

    #[test]
    fn test_default_policy_matches_default_settings() {
        assert_eq!(retry_policy(&FetchSettings::default()), RetryPolicy::default());
    }

    #[tokio::test]
    async fn test_from_config_builds_default_pipeline() {
        let service = StatsService::from_config(&Config::default()).unwrap();
        assert!(service.cache().is_some());
        assert!(format!("{:?}", service.aggregator()).contains("HubCasts"));
        assert_eq!(service.cache_stats()["entry_count"], 0);
    }

    #[tokio::test]
    async fn test_disabled_cache_and_neynar_providers() {
        let mut config = Config::default();
        config.cache.enabled = false;
        config.posts.provider = PostsProvider::Neynar;
        config.graph.provider = GraphProvider::Neynar;

        let service = StatsService::from_config(&config).unwrap();
        assert!(service.cache().is_none());
        assert!(service.cache_stats().is_empty());

        let rendered = format!("{:?}", service.aggregator());
        assert!(rendered.contains("NeynarCasts"));
        assert!(rendered.contains("NeynarGraph"));
    }
}
