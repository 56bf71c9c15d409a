//! Property tests for cursor-paged counting.

use caststats_common::{Fid, SourceResult, SourceTag};
use caststats_sources::{count_pages, Page};
use proptest::prelude::*;
use std::sync::Mutex;

fn run<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

/// Pages as `(items, has_next)`; the last page never has a cursor
fn listing(sizes: &[u64]) -> Vec<Page> {
    sizes
        .iter()
        .enumerate()
        .map(|(i, items)| {
            let next = (i + 1 < sizes.len()).then(|| format!("p{}", i + 1));
            Page::new(*items, next)
        })
        .collect()
}

proptest! {
    #[test]
    fn complete_listing_sums_every_page(sizes in prop::collection::vec(0u64..1000, 1..6)) {
        let pages = Mutex::new(listing(&sizes).into_iter());
        let fid = Fid::new(1).unwrap();

        let result = run(count_pages(SourceTag::HubCasts, fid, 10, |_cursor| {
            let page = pages.lock().unwrap().next();
            async move { page }
        }));

        prop_assert_eq!(result, SourceResult::real(sizes.iter().sum::<u64>()));
    }

    #[test]
    fn truncated_listing_counts_only_fetched_pages(
        sizes in prop::collection::vec(0u64..1000, 2..8),
        max_pages in 1u32..8,
    ) {
        let pages = Mutex::new(listing(&sizes).into_iter());
        let fid = Fid::new(1).unwrap();

        let result = run(count_pages(SourceTag::HubCasts, fid, max_pages, |_cursor| {
            let page = pages.lock().unwrap().next();
            async move { page }
        }));

        let fetched = (max_pages as usize).min(sizes.len());
        let expected_total: u64 = sizes[..fetched].iter().sum();
        let expected = if fetched < sizes.len() {
            SourceResult::RealCount { value: expected_total, has_more: true }
        } else {
            SourceResult::real(expected_total)
        };
        prop_assert_eq!(result, expected);
    }

    #[test]
    fn failure_after_first_page_is_an_estimate(
        sizes in prop::collection::vec(0u64..1000, 1..5),
    ) {
        // Every listed page links onward, then the next fetch fails.
        let mut pages: Vec<Option<Page>> = sizes
            .iter()
            .map(|items| Some(Page::new(*items, Some("more".to_string()))))
            .collect();
        pages.push(None);
        let pages = Mutex::new(pages.into_iter());
        let fid = Fid::new(1).unwrap();

        let result = run(count_pages(SourceTag::NeynarCasts, fid, 10, |_cursor| {
            let page = pages.lock().unwrap().next().flatten();
            async move { page }
        }));

        prop_assert_eq!(result, SourceResult::estimated(sizes.iter().sum::<u64>()));
    }
}
