//! Concurrent stats aggregation and reconciliation

use caststats_common::{
    CastStatsError, Fid, FollowCounts, Result, SourceResult, StatsRecord, StatusTier,
};
use caststats_sources::StatsSource;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Shared handle to a post (cast) count source
pub type PostSource = Arc<dyn StatsSource<Output = u64>>;

/// Shared handle to a follower/following source
pub type GraphSource = Arc<dyn StatsSource<Output = FollowCounts>>;

/// Deterministic follow counts used when no graph provider answered
///
/// `followers = (fid·3) mod 500 + 10`, `following = (fid·5) mod 300 + 50`,
/// reduced before multiplying so no `u64` fid can overflow.
pub fn fallback_follow_counts(fid: Fid) -> FollowCounts {
    let raw = fid.get();
    FollowCounts::new((raw % 500) * 3 % 500 + 10, (raw % 300) * 5 % 300 + 50)
}

/// Combine one post result and one graph result into a [`StatsRecord`]
pub fn reconcile(
    fid: Fid,
    posts: SourceResult<u64>,
    follows: SourceResult<FollowCounts>,
) -> StatsRecord {
    let (post_count, is_estimated) = match posts {
        SourceResult::RealCount { value, has_more } => {
            if has_more {
                info!("Post count for fid {} hit the page limit; {} is a lower bound", fid, value);
            }
            (value, false)
        }
        SourceResult::EstimatedCount { value } => (value, true),
        SourceResult::Unavailable => {
            warn!("No post source answered for fid {}", fid);
            (0, true)
        }
    };

    let (counts, follows_estimated) = match follows {
        SourceResult::RealCount { value, .. } => (value, false),
        SourceResult::EstimatedCount { value } => (value, true),
        SourceResult::Unavailable => {
            warn!("No graph source answered for fid {}; using fallback counts", fid);
            (fallback_follow_counts(fid), true)
        }
    };

    StatsRecord {
        fid,
        post_count,
        follower_count: counts.followers,
        following_count: counts.following,
        status_tier: StatusTier::from_post_count(post_count),
        is_estimated,
        follows_estimated,
    }
}

/// Fans one request out to a post source and a graph source
#[derive(Clone)]
pub struct StatsAggregator {
    posts: PostSource,
    follows: GraphSource,
}

impl StatsAggregator {
    pub fn new(posts: PostSource, follows: GraphSource) -> Self {
        Self { posts, follows }
    }

    /// Statistics for `fid`; never fails
    ///
    /// Both sources run concurrently and both are awaited to completion
    /// before reconciling.
    #[instrument(skip(self), fields(fid = %fid, posts = %self.posts.tag(), graph = %self.follows.tag()))]
    pub async fn get_stats(&self, fid: Fid) -> StatsRecord {
        let (posts, follows) = tokio::join!(self.posts.resolve(fid), self.follows.resolve(fid));
        debug!("Sources settled: posts {}, graph {}", posts.kind(), follows.kind());

        let record = reconcile(fid, posts, follows);
        info!(
            "Stats for fid {}: {} posts ({}), {} followers, {} following",
            fid, record.post_count, record.status_tier, record.follower_count, record.following_count
        );
        record
    }

    /// Statistics for an untrusted identifier
    ///
    /// A missing, empty, non-numeric or zero identifier is
    /// [`CastStatsError::MissingInput`], the only error this returns.
    pub async fn get_stats_for(&self, raw_fid: Option<&str>) -> Result<StatsRecord> {
        let fid = raw_fid.and_then(Fid::parse).ok_or_else(|| {
            warn!("Rejected stats request without a usable fid: {:?}", raw_fid);
            CastStatsError::MissingInput
        })?;

        Ok(self.get_stats(fid).await)
    }
}

impl std::fmt::Debug for StatsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsAggregator")
            .field("posts", &self.posts.tag())
            .field("follows", &self.follows.tag())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use caststats_common::SourceTag;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedPosts(SourceResult<u64>);

    #[async_trait]
    impl StatsSource for FixedPosts {
        type Output = u64;

        fn tag(&self) -> SourceTag {
            SourceTag::HubCasts
        }

        async fn resolve(&self, _fid: Fid) -> SourceResult<u64> {
            self.0.clone()
        }
    }

    /// Answers after a delay and counts how many lookups finished
    struct SlowGraph {
        delay: Duration,
        result: SourceResult<FollowCounts>,
        finished: AtomicUsize,
    }

    #[async_trait]
    impl StatsSource for SlowGraph {
        type Output = FollowCounts;

        fn tag(&self) -> SourceTag {
            SourceTag::WarpcastGraph
        }

        async fn resolve(&self, _fid: Fid) -> SourceResult<FollowCounts> {
            tokio::time::sleep(self.delay).await;
            self.finished.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn fid(raw: u64) -> Fid {
        Fid::new(raw).unwrap()
    }

    #[test]
    fn test_fallback_values() {
        assert_eq!(fallback_follow_counts(fid(7)), FollowCounts::new(31, 85));
        assert_eq!(fallback_follow_counts(fid(12345)), FollowCounts::new(45, 275));
        assert_eq!(fallback_follow_counts(fid(u64::MAX)), {
            let raw = u64::MAX as u128;
            FollowCounts::new((raw * 3 % 500 + 10) as u64, (raw * 5 % 300 + 50) as u64)
        });
    }

    #[test]
    fn test_reconcile_real_results() {
        let record = reconcile(
            fid(12345),
            SourceResult::real(42),
            SourceResult::real(FollowCounts::new(88, 140)),
        );
        assert_eq!(record.post_count, 42);
        assert_eq!(record.status_tier, StatusTier::Newbie);
        assert_eq!(record.follower_count, 88);
        assert_eq!(record.following_count, 140);
        assert!(!record.is_estimated);
        assert!(!record.follows_estimated);
    }

    #[test]
    fn test_reconcile_truncated_count_is_not_estimated() {
        let record = reconcile(
            fid(1),
            SourceResult::RealCount {
                value: 5000,
                has_more: true,
            },
            SourceResult::real(FollowCounts::new(1, 1)),
        );
        assert_eq!(record.post_count, 5000);
        assert_eq!(record.status_tier, StatusTier::Megacaster);
        assert!(!record.is_estimated);
    }

    #[test]
    fn test_reconcile_estimates() {
        let record = reconcile(
            fid(3),
            SourceResult::estimated(150),
            SourceResult::estimated(FollowCounts::new(0, 12)),
        );
        assert_eq!(record.post_count, 150);
        assert_eq!(record.status_tier, StatusTier::Farcaster);
        assert!(record.is_estimated);
        assert_eq!(record.follower_count, 0);
        assert_eq!(record.following_count, 12);
        assert!(record.follows_estimated);
    }

    #[test]
    fn test_reconcile_total_failure() {
        let record = reconcile(fid(7), SourceResult::Unavailable, SourceResult::Unavailable);
        assert_eq!(record.post_count, 0);
        assert!(record.is_estimated);
        assert_eq!(record.status_tier, StatusTier::Newbie);
        assert_eq!(record.follower_count, 31);
        assert_eq!(record.following_count, 85);
        assert!(record.follows_estimated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sources_run_concurrently_and_both_settle() {
        let graph = Arc::new(SlowGraph {
            delay: Duration::from_secs(2),
            result: SourceResult::real(FollowCounts::new(5, 6)),
            finished: AtomicUsize::new(0),
        });
        let aggregator = StatsAggregator::new(
            Arc::new(FixedPosts(SourceResult::Unavailable)),
            Arc::clone(&graph) as GraphSource,
        );

        let record = aggregator.get_stats(fid(9)).await;
        assert_eq!(graph.finished.load(Ordering::SeqCst), 1);
        assert_eq!(record.follower_count, 5);
        assert_eq!(record.post_count, 0);
        assert!(record.is_estimated);
        assert!(!record.follows_estimated);
    }

    #[tokio::test]
    async fn test_get_stats_for_rejects_missing_input() {
        let aggregator = StatsAggregator::new(
            Arc::new(FixedPosts(SourceResult::real(1))),
            Arc::new(SlowGraph {
                delay: Duration::ZERO,
                result: SourceResult::Unavailable,
                finished: AtomicUsize::new(0),
            }),
        );

        for raw in [None, Some(""), Some("   "), Some("abc"), Some("0"), Some("-5")] {
            let err = aggregator.get_stats_for(raw).await.unwrap_err();
            assert!(err.is_missing_input(), "{raw:?} should be missing input");
        }

        let record = aggregator.get_stats_for(Some(" 12 ")).await.unwrap();
        assert_eq!(record.fid, fid(12));
        assert_eq!(record.post_count, 1);
    }
}
