//! Cast counts from a Farcaster hub's HTTP API

use crate::pagination::{count_pages, Page};
use crate::source::StatsSource;
use async_trait::async_trait;
use caststats_common::{Fid, SourceResult, SourceTag};
use caststats_fetch::{FetchRequest, ResilientFetcher};
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

/// Hubs cap `pageSize` at this value
pub const HUB_MAX_PAGE_SIZE: u32 = 1000;

/// A page of `/v1/castsByFid`; message bodies are never inspected
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CastsByFidPage {
    messages: Vec<IgnoredAny>,
    next_page_token: Option<String>,
}

/// Counts a user's casts by paging `GET {base}/v1/castsByFid`
#[derive(Debug, Clone)]
pub struct HubCastSource {
    fetcher: ResilientFetcher,
    base_url: String,
    api_key: Option<String>,
    page_size: u32,
    max_pages: u32,
}

impl HubCastSource {
    pub fn new(fetcher: ResilientFetcher, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
            api_key: None,
            page_size: HUB_MAX_PAGE_SIZE,
            max_pages: 5,
        }
    }

    /// Send `Authorization: Bearer <key>` (hosted hubs)
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_paging(mut self, page_size: u32, max_pages: u32) -> Self {
        self.page_size = page_size.clamp(1, HUB_MAX_PAGE_SIZE);
        self.max_pages = max_pages.max(1);
        self
    }

    fn build_url(&self) -> String {
        format!("{}/v1/castsByFid", self.base_url.trim_end_matches('/'))
    }

    async fn fetch_page(&self, fid: Fid, page_token: Option<String>) -> Option<Page> {
        let request = FetchRequest::get(self.build_url())
            .query("fid", fid)
            .query("pageSize", self.page_size)
            .query_opt("pageToken", page_token)
            .bearer(self.api_key.clone());

        let document = match self.fetcher.fetch_json(&request).await {
            Ok(document) => document,
            Err(e) => {
                warn!("Hub cast lookup failed for fid {}: {}", fid, e);
                return None;
            }
        };

        match serde_json::from_value::<CastsByFidPage>(document) {
            Ok(page) => Some(Page::new(page.messages.len() as u64, page.next_page_token)),
            Err(e) => {
                warn!("Unexpected castsByFid document for fid {}: {}", fid, e);
                None
            }
        }
    }
}

#[async_trait]
impl StatsSource for HubCastSource {
    type Output = u64;

    fn tag(&self) -> SourceTag {
        SourceTag::HubCasts
    }

    #[instrument(skip(self), fields(source = "hub_casts"))]
    async fn resolve(&self, fid: Fid) -> SourceResult<u64> {
        let result = count_pages(self.tag(), fid, self.max_pages, |token| {
            self.fetch_page(fid, token)
        })
        .await;

        debug!("Hub cast count for fid {}: {:?}", fid, result);
        result
    }
}
