//! Cast and follow counts from the Neynar API

use crate::pagination::{count_pages, Page};
use crate::parse::follow_counts_at;
use crate::source::StatsSource;
use async_trait::async_trait;
use caststats_common::{Fid, FollowCounts, SourceResult, SourceTag};
use caststats_fetch::{FetchRequest, ResilientFetcher};
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Neynar caps feed `limit` at this value
pub const NEYNAR_MAX_PAGE_SIZE: u32 = 150;

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FeedPage {
    casts: Vec<IgnoredAny>,
    next: Option<NextCursor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NextCursor {
    cursor: Option<String>,
}

fn with_api_key(request: FetchRequest, api_key: Option<&str>) -> FetchRequest {
    match api_key {
        Some(key) => request.secret_header(API_KEY_HEADER, key),
        None => request,
    }
}

/// Counts a user's casts by paging `GET {base}/v2/farcaster/feed/user/casts`
#[derive(Debug, Clone)]
pub struct NeynarCastSource {
    fetcher: ResilientFetcher,
    base_url: String,
    api_key: Option<String>,
    page_size: u32,
    max_pages: u32,
}

impl NeynarCastSource {
    pub fn new(fetcher: ResilientFetcher, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            api_key,
            page_size: NEYNAR_MAX_PAGE_SIZE,
            max_pages: 5,
        }
    }

    pub fn with_paging(mut self, page_size: u32, max_pages: u32) -> Self {
        self.page_size = page_size.clamp(1, NEYNAR_MAX_PAGE_SIZE);
        self.max_pages = max_pages.max(1);
        self
    }

    async fn fetch_page(&self, fid: Fid, cursor: Option<String>) -> Option<Page> {
        let url = format!(
            "{}/v2/farcaster/feed/user/casts",
            self.base_url.trim_end_matches('/')
        );
        let request = FetchRequest::get(url)
            .query("fid", fid)
            .query("limit", self.page_size)
            .query_opt("cursor", cursor);
        let request = with_api_key(request, self.api_key.as_deref());

        let document = match self.fetcher.fetch_json(&request).await {
            Ok(document) => document,
            Err(e) => {
                warn!("Neynar feed lookup failed for fid {}: {}", fid, e);
                return None;
            }
        };

        match serde_json::from_value::<FeedPage>(document) {
            Ok(page) => Some(Page::new(
                page.casts.len() as u64,
                page.next.and_then(|next| next.cursor),
            )),
            Err(e) => {
                warn!("Unexpected Neynar feed document for fid {}: {}", fid, e);
                None
            }
        }
    }
}

#[async_trait]
impl StatsSource for NeynarCastSource {
    type Output = u64;

    fn tag(&self) -> SourceTag {
        SourceTag::NeynarCasts
    }

    #[instrument(skip(self), fields(source = "neynar_casts"))]
    async fn resolve(&self, fid: Fid) -> SourceResult<u64> {
        let result = count_pages(self.tag(), fid, self.max_pages, |cursor| {
            self.fetch_page(fid, cursor)
        })
        .await;

        debug!("Neynar cast count for fid {}: {:?}", fid, result);
        result
    }
}

/// Reads follow counts from `GET {base}/v2/farcaster/user/bulk?fids=`
#[derive(Debug, Clone)]
pub struct NeynarGraphSource {
    fetcher: ResilientFetcher,
    base_url: String,
    api_key: Option<String>,
}

impl NeynarGraphSource {
    pub fn new(fetcher: ResilientFetcher, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl StatsSource for NeynarGraphSource {
    type Output = FollowCounts;

    fn tag(&self) -> SourceTag {
        SourceTag::NeynarGraph
    }

    #[instrument(skip(self), fields(source = "neynar_graph"))]
    async fn resolve(&self, fid: Fid) -> SourceResult<FollowCounts> {
        let url = format!("{}/v2/farcaster/user/bulk", self.base_url.trim_end_matches('/'));
        let request = with_api_key(FetchRequest::get(url).query("fids", fid), self.api_key.as_deref());

        let document = match self.fetcher.fetch_json(&request).await {
            Ok(document) => document,
            Err(e) => {
                warn!("Neynar user lookup failed for fid {}: {}", fid, e);
                return SourceResult::Unavailable;
            }
        };

        let result = follow_counts_at(&document, "/users/0", "follower_count", "following_count");
        if !result.is_available() {
            warn!("Neynar returned no user for fid {}", fid);
        }
        debug!("Neynar follow counts for fid {}: {:?}", fid, result);
        result
    }
}
