//! Fetch scheduler: one fetch-and-store cycle for the stalest feed.

use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use super::fetcher::FeedSource;
use super::store::FeedStore;
use super::types::Feed;
use super::writer::{IngestReport, PostWriter};
use crate::Result;

/// What a cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// There were no feeds to poll.
    NoFeeds,
    /// A feed was fetched and its entries written.
    Fetched {
        /// The feed, with `last_fetched_at` already updated.
        feed: Feed,
        /// Counts from writing its entries.
        report: IngestReport,
    },
}

/// Picks the next feed, fetches it and stores its new posts.
pub struct FetchScheduler<S, F> {
    store: S,
    source: F,
    deadline: Duration,
}

impl<S: FeedStore, F: FeedSource> FetchScheduler<S, F> {
    /// Create a scheduler; `deadline` bounds each fetch.
    pub fn new(store: S, source: F, deadline: Duration) -> Self {
        Self {
            store,
            source,
            deadline,
        }
    }

    /// Run one cycle.
    ///
    /// The feed is marked fetched before the request goes out, so a feed
    /// that keeps failing still rotates to the back of the queue.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let Some(next) = self.store.next_feed_to_poll().await? else {
            return Ok(CycleOutcome::NoFeeds);
        };

        let feed = self.store.mark_fetched(next.id, Utc::now()).await?;
        debug!("Fetching feed {} ({})", feed.id, feed.url);

        let parsed = self.source.fetch(&feed.url, self.deadline).await?;
        let report = PostWriter::new(&self.store)
            .write(feed.id, &parsed.entries)
            .await?;

        Ok(CycleOutcome::Fetched { feed, report })
    }
}
