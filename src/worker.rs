//! The N-worker fetch/extract/enqueue loop.
//!
//! Workers are plain tokio tasks driven by `for_each_concurrent` rather than
//! OS threads — nothing in the frontier's contract requires a worker to be
//! an OS thread, only that politeness waits happen outside its lock.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::analytics::Analytics;
use crate::cache_client::CacheClient;
use crate::frontier::Frontier;
use crate::scraper;

pub async fn run(frontier: Arc<Frontier>, cache: Arc<CacheClient>, analytics: Arc<Analytics>, worker_count: usize) {
    stream::iter(0..worker_count)
        .for_each_concurrent(worker_count, |id| {
            let frontier = frontier.clone();
            let cache = cache.clone();
            let analytics = analytics.clone();
            async move { worker_loop(id, frontier, cache, analytics).await }
        })
        .await;
}

async fn worker_loop(id: usize, frontier: Arc<Frontier>, cache: Arc<CacheClient>, analytics: Arc<Analytics>) {
    loop {
        let Some(url) = frontier.get_tbd_url().await else {
            tracing::debug!(worker = id, "frontier closed, worker exiting");
            return;
        };

        frontier.wait_for_politeness(&url).await;

        let resp = cache.fetch(&url).await;
        if let Some(err) = &resp.error {
            tracing::warn!(worker = id, url = %url, error = %err, "fetch failed");
        }

        let links = scraper::scrape(&url, &resp, &analytics);
        for link in links {
            frontier.add_url(&link).await;
        }

        frontier.mark_url_complete(&url).await;
    }
}
