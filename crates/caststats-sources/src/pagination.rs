//! Cursor-paged counting shared by the cast adapters

use caststats_common::{Fid, SourceResult, SourceTag};
use std::future::Future;
use tracing::{debug, warn};

/// One page of a cursor-paged listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Items on this page
    pub items: u64,
    /// Cursor for the next page; `None` when this was the last one
    pub next: Option<String>,
}

impl Page {
    /// Build a page, treating an empty cursor as "no more pages"
    pub fn new(items: u64, next: Option<String>) -> Self {
        Self {
            items,
            next: next.filter(|cursor| !cursor.is_empty()),
        }
    }
}

/// Walk up to `max_pages` pages and sum their items
///
/// `fetch_page` receives the cursor of the page to load (`None` for the
/// first) and returns `None` when the page could not be fetched or parsed.
/// A failed first page yields `Unavailable`, a failed later page yields an
/// estimate of what was counted so far, and running out of pages with more
/// remaining yields a real count with `has_more` set.
pub async fn count_pages<F, Fut>(
    tag: SourceTag,
    fid: Fid,
    max_pages: u32,
    mut fetch_page: F,
) -> SourceResult<u64>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Option<Page>>,
{
    let max_pages = max_pages.max(1);
    let mut total: u64 = 0;
    let mut cursor: Option<String> = None;

    for page_number in 1..=max_pages {
        let page = match fetch_page(cursor.take()).await {
            Some(page) => page,
            None if page_number == 1 => return SourceResult::Unavailable,
            None => {
                warn!(
                    "{} page {} failed for fid {}; reporting {} as an estimate",
                    tag, page_number, fid, total
                );
                return SourceResult::estimated(total);
            }
        };

        total = total.saturating_add(page.items);

        match page.next {
            None => {
                debug!("{} counted {} items for fid {} in {} page(s)", tag, total, fid, page_number);
                return SourceResult::real(total);
            }
            Some(next) => cursor = Some(next),
        }
    }

    debug!(
        "{} stopped after {} pages for fid {} with more remaining",
        tag, max_pages, fid
    );
    SourceResult::RealCount {
        value: total,
        has_more: true,
    }
}
