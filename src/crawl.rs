//! The crawl controller: seed-driven expansion of the link graph.
//!
//! A single task owns every piece of mutable state (global dedup filter,
//! graph, pending queue) and polls all in-flight fetches from one
//! `FuturesUnordered`, so the whole crawl is cooperative and lock-free.

use std::collections::VecDeque;

use futures_util::stream::{FuturesUnordered, StreamExt};
use log::{debug, warn};

use crate::bloom::{self, BloomFilter};
use crate::fetch::{Connector, FetchEngine, FetchOptions, FetchOutcome, FetchStatus};
use crate::graph::LinkGraph;
use crate::html;
use crate::urls;

#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub fetch: FetchOptions,
    /// Bit-array size of the crawl-wide fetched-URL filter.
    pub global_filter_bits: usize,
    /// Bit-array size of each per-page link filter.
    pub page_filter_bits: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            global_filter_bits: bloom::GLOBAL_FILTER_BITS,
            page_filter_bits: bloom::PAGE_FILTER_BITS,
        }
    }
}

/// Dedup scope for the page currently being parsed: the page's canonical URL
/// and a filter suppressing duplicate same-page edges.
struct PageScope<'a> {
    src_url: &'a str,
    filter: BloomFilter,
}

/// Crawl breadth-first from `seed` and return the recorded link graph.
///
/// Fetch failures are logged and dropped, so the returned graph can be
/// partial. The loop ends when no request is in flight and nothing is
/// waiting on a free descriptor.
pub async fn crawl<C: Connector>(
    engine: &FetchEngine<C>,
    opts: &CrawlOptions,
    seed: &str,
) -> LinkGraph {
    let mut fetched = BloomFilter::new(opts.global_filter_bits);
    let mut graph = LinkGraph::new();
    let mut pending: VecDeque<String> = VecDeque::new();
    let mut inflight = FuturesUnordered::new();
    let mut submit: Vec<String> = Vec::new();

    process_url(seed, None, &mut fetched, &mut graph, &mut submit);
    for url in submit.drain(..) {
        inflight.push(engine.fetch(url));
    }

    loop {
        while let Some(outcome) = inflight.next().await {
            let FetchOutcome { url, status, body } = outcome;

            if status == FetchStatus::FdLimit {
                // Out of descriptors; park the URL until another request
                // reaches a terminal state and releases one.
                pending.push_back(url);
                continue;
            }

            // A descriptor was just released; replay everything deferred.
            for parked in pending.drain(..) {
                inflight.push(engine.fetch(parked));
            }

            if status != FetchStatus::Succ {
                warn!("dropping {url}: {status}");
                continue;
            }
            let Some(page) = body else {
                warn!("dropping {url}: response carried no body");
                continue;
            };

            let mut scope = PageScope {
                src_url: &url,
                filter: BloomFilter::new(opts.page_filter_bits),
            };
            html::for_each_href(&page, |href| {
                process_url(href, Some(&mut scope), &mut fetched, &mut graph, &mut submit);
            });
            drop(scope);

            for next in submit.drain(..) {
                inflight.push(engine.fetch(next));
            }
        }

        // Settle phase: a crawl can end on an fd-limited request with nothing
        // left in flight to trigger the replay above.
        if pending.is_empty() {
            break;
        }
        for parked in pending.drain(..) {
            inflight.push(engine.fetch(parked));
        }
    }

    debug_assert!(inflight.is_empty() && pending.is_empty());
    graph
}

/// Canonicalize one reference and route it: record the edge from the
/// referring page (deduped per page), then schedule a fetch unless the URL
/// has been seen crawl-wide.
fn process_url(
    raw: &str,
    page: Option<&mut PageScope<'_>>,
    fetched: &mut BloomFilter,
    graph: &mut LinkGraph,
    submit: &mut Vec<String>,
) {
    let referrer = page.as_ref().map(|scope| scope.src_url);
    let Some(url) = urls::fix_url(raw, referrer) else {
        warn!("failed to parse {raw}");
        return;
    };

    if let Some(scope) = page {
        debug_assert!(fetched.test(scope.src_url));
        if !scope.filter.test(&url) {
            scope.filter.add(&url);
            graph.connect(scope.src_url, &url);
        }
    }

    if !fetched.test(&url) {
        fetched.add(&url);
        debug!("> {url}");
        submit.push(url);
    }
}
