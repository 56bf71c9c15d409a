//! Follower and following counts from Warpcast's public API

use crate::parse::follow_counts_at;
use crate::source::StatsSource;
use async_trait::async_trait;
use caststats_common::{Fid, FollowCounts, SourceResult, SourceTag};
use caststats_fetch::{FetchRequest, ResilientFetcher};
use tracing::{debug, instrument, warn};

/// Reads `result.user.followerCount` / `followingCount` from
/// `GET {base}/v2/user-by-fid?fid=`
#[derive(Debug, Clone)]
pub struct WarpcastGraphSource {
    fetcher: ResilientFetcher,
    base_url: String,
    api_key: Option<String>,
}

impl WarpcastGraphSource {
    pub fn new(fetcher: ResilientFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Send `Authorization: Bearer <key>`; the endpoint also answers anonymously
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    fn build_request(&self, fid: Fid) -> FetchRequest {
        FetchRequest::get(format!("{}/v2/user-by-fid", self.base_url.trim_end_matches('/')))
            .query("fid", fid)
            .bearer(self.api_key.clone())
    }
}

#[async_trait]
impl StatsSource for WarpcastGraphSource {
    type Output = FollowCounts;

    fn tag(&self) -> SourceTag {
        SourceTag::WarpcastGraph
    }

    #[instrument(skip(self), fields(source = "warpcast_graph"))]
    async fn resolve(&self, fid: Fid) -> SourceResult<FollowCounts> {
        let document = match self.fetcher.fetch_json(&self.build_request(fid)).await {
            Ok(document) => document,
            Err(e) => {
                warn!("Warpcast user lookup failed for fid {}: {}", fid, e);
                return SourceResult::Unavailable;
            }
        };

        let result = follow_counts_at(&document, "/result/user", "followerCount", "followingCount");
        match &result {
            SourceResult::Unavailable => warn!("Warpcast returned no user for fid {}", fid),
            SourceResult::EstimatedCount { .. } => {
                warn!("Warpcast user for fid {} is missing a follow count", fid)
            }
            SourceResult::RealCount { .. } => {}
        }

        debug!("Warpcast follow counts for fid {}: {:?}", fid, result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caststats_fetch::test_utils::{scripted_fetcher, test_policy, Scripted, ScriptedTransport};
    use serde_json::json;
    use std::sync::Arc;

    fn fid(raw: u64) -> Fid {
        Fid::new(raw).unwrap()
    }

    fn source(transport: &Arc<ScriptedTransport>) -> WarpcastGraphSource {
        WarpcastGraphSource::new(
            scripted_fetcher(transport.clone(), test_policy()),
            "https://api.warpcast.test",
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_user_counts() {
        let transport = Arc::new(ScriptedTransport::new().route(
            "user-by-fid?fid=12345",
            [Scripted::json(json!({
                "result": {"user": {"fid": 12345, "username": "alice", "followerCount": 88, "followingCount": 140}}
            }))],
        ));

        assert_eq!(
            source(&transport).resolve(fid(12345)).await,
            SourceResult::real(FollowCounts::new(88, 140))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_count_is_estimate() {
        let transport = Arc::new(ScriptedTransport::new().route(
            "user-by-fid",
            [Scripted::json(json!({"result": {"user": {"followingCount": 12}}}))],
        ));

        assert_eq!(
            source(&transport).resolve(fid(2)).await,
            SourceResult::estimated(FollowCounts::new(0, 12))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_user_is_unavailable() {
        let transport = Arc::new(ScriptedTransport::new().route(
            "user-by-fid",
            [Scripted::json(json!({"errors": [{"message": "No FID associated with that user"}]}))],
        ));

        assert_eq!(source(&transport).resolve(fid(2)).await, SourceResult::Unavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_upstream_is_unavailable_after_retries() {
        let transport =
            Arc::new(ScriptedTransport::new().route("user-by-fid", [Scripted::fail("connection refused")]));

        assert_eq!(source(&transport).resolve(fid(7)).await, SourceResult::Unavailable);
        assert_eq!(transport.calls_matching("user-by-fid"), 3);
    }

    #[test]
    fn test_request_shape() {
        let transport = Arc::new(ScriptedTransport::new());
        let source = source(&transport).with_api_key(Some("wc".to_string()));
        let request = source.build_request(fid(9));
        assert_eq!(request.full_url(), "https://api.warpcast.test/v2/user-by-fid?fid=9");
        assert_eq!(request.bearer_token(), Some("wc"));
    }
}
