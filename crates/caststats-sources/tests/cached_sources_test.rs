//! Cache behaviour observed through real adapters and a scripted transport.

use caststats_common::{Fid, FollowCounts, SourceResult};
use caststats_fetch::test_utils::{scripted_fetcher, test_policy, Scripted, ScriptedTransport};
use caststats_sources::{
    CachedSource, HubCastSource, ResultCache, StatsSource, WarpcastGraphSource,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn fid(raw: u64) -> Fid {
    Fid::new(raw).unwrap()
}

fn hub_transport() -> Arc<ScriptedTransport> {
    Arc::new(ScriptedTransport::new().route(
        "castsByFid",
        [Scripted::json(json!({"messages": [{}, {}, {}], "nextPageToken": ""}))],
    ))
}

#[tokio::test(start_paused = true)]
async fn test_two_lookups_within_ttl_make_one_network_call() {
    let transport = hub_transport();
    let cache = Arc::new(ResultCache::new(Duration::from_secs(300)));
    let source = CachedSource::new(
        HubCastSource::new(scripted_fetcher(transport.clone(), test_policy()), "https://hub.test"),
        Arc::clone(&cache),
    );

    let first = source.resolve(fid(12345)).await;
    tokio::time::advance(Duration::from_secs(299)).await;
    let second = source.resolve(fid(12345)).await;

    assert_eq!(first, SourceResult::real(3));
    assert_eq!(first, second);
    assert_eq!(transport.total_calls(), 1);
    assert_eq!(cache.stats()["hits"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_lookup_after_expiry_makes_exactly_one_new_call() {
    let transport = hub_transport();
    let cache = Arc::new(ResultCache::new(Duration::from_secs(300)));
    let source = CachedSource::new(
        HubCastSource::new(scripted_fetcher(transport.clone(), test_policy()), "https://hub.test"),
        cache,
    );

    source.resolve(fid(1)).await;
    tokio::time::advance(Duration::from_secs(301)).await;
    source.resolve(fid(1)).await;
    source.resolve(fid(1)).await;

    assert_eq!(transport.total_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_not_cached() {
    let transport = Arc::new(ScriptedTransport::new().route(
        "user-by-fid",
        [
            Scripted::status(500),
            Scripted::status(500),
            Scripted::status(500),
            Scripted::json(json!({"result": {"user": {"followerCount": 1, "followingCount": 2}}})),
        ],
    ));
    let source = CachedSource::new(
        WarpcastGraphSource::new(
            scripted_fetcher(transport.clone(), test_policy()),
            "https://api.warpcast.test",
        ),
        Arc::new(ResultCache::default()),
    );

    assert_eq!(source.resolve(fid(4)).await, SourceResult::Unavailable);
    assert_eq!(
        source.resolve(fid(4)).await,
        SourceResult::real(FollowCounts::new(1, 2))
    );
    assert_eq!(transport.total_calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_sources_share_one_cache_without_collisions() {
    let posts_transport = hub_transport();
    let graph_transport = Arc::new(ScriptedTransport::new().route(
        "user-by-fid",
        [Scripted::json(json!({"result": {"user": {"followerCount": 8, "followingCount": 9}}}))],
    ));
    let cache = Arc::new(ResultCache::default());

    let posts: Arc<dyn StatsSource<Output = u64>> = Arc::new(CachedSource::new(
        HubCastSource::new(scripted_fetcher(posts_transport, test_policy()), "https://hub.test"),
        Arc::clone(&cache),
    ));
    let graph: Arc<dyn StatsSource<Output = FollowCounts>> = Arc::new(CachedSource::new(
        WarpcastGraphSource::new(
            scripted_fetcher(graph_transport, test_policy()),
            "https://api.warpcast.test",
        ),
        Arc::clone(&cache),
    ));

    let (p, g) = tokio::join!(posts.resolve(fid(10)), graph.resolve(fid(10)));
    assert_eq!(p, SourceResult::real(3));
    assert_eq!(g, SourceResult::real(FollowCounts::new(8, 9)));
    assert_eq!(cache.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_partial_listing_estimate_is_not_cached() {
    // The first match wins, so the second page's route goes first.
    let transport = Arc::new(
        ScriptedTransport::new()
            .route(
                "pageToken=t1",
                [
                    Scripted::status(503),
                    Scripted::status(503),
                    Scripted::status(503),
                    Scripted::json(json!({"messages": [{}], "nextPageToken": ""})),
                ],
            )
            .route(
                "castsByFid",
                [Scripted::json(json!({"messages": [{}, {}], "nextPageToken": "t1"}))],
            ),
    );
    let cache = Arc::new(ResultCache::default());
    let source = CachedSource::new(
        HubCastSource::new(scripted_fetcher(transport.clone(), test_policy()), "https://hub.test"),
        Arc::clone(&cache),
    );

    assert_eq!(source.resolve(fid(21)).await, SourceResult::estimated(2));
    assert_eq!(transport.total_calls(), 4);
    assert!(cache.is_empty());

    // The upstream has recovered; the next lookup goes back to it.
    assert_eq!(source.resolve(fid(21)).await, SourceResult::real(3));
    assert_eq!(transport.total_calls(), 6);
    assert_eq!(cache.len(), 1);

    assert_eq!(source.resolve(fid(21)).await, SourceResult::real(3));
    assert_eq!(transport.total_calls(), 6);
}
