//! Test helpers for the ingestion pipeline tests.

#![allow(dead_code)]

use std::time::Duration;

use gator::config::AggregatorConfig;
use gator::feed::{Feed, FeedFetcher, FeedRepository, FetchScheduler, NewFeed, SqliteFeedStore};
use gator::{Database, User, UserRepository};

/// Deadline used for every fetch in tests.
pub const FETCH_DEADLINE: Duration = Duration::from_secs(5);

/// Aggregator settings with short timeouts.
pub fn aggregator_config() -> AggregatorConfig {
    AggregatorConfig {
        connect_timeout_secs: 2,
        read_timeout_secs: 2,
        total_timeout_secs: 5,
        ..AggregatorConfig::default()
    }
}

/// Fresh in-memory database with one registered user.
pub async fn setup_db() -> (Database, User) {
    let db = Database::open_in_memory()
        .await
        .expect("Failed to open in-memory database");
    let user = UserRepository::new(db.pool())
        .create("alice")
        .await
        .expect("Failed to create user");
    (db, user)
}

/// Register a feed owned by `user`.
pub async fn add_feed(db: &Database, user: &User, name: &str, url: &str) -> Feed {
    FeedRepository::new(db.pool())
        .create(&NewFeed::new(name, url, user.id))
        .await
        .expect("Failed to create feed")
}

/// Scheduler wired to the real fetcher and SQLite store.
pub fn scheduler(db: &Database) -> FetchScheduler<SqliteFeedStore, FeedFetcher> {
    let fetcher = FeedFetcher::new(&aggregator_config()).expect("Failed to build fetcher");
    FetchScheduler::new(SqliteFeedStore::new(db.pool().clone()), fetcher, FETCH_DEADLINE)
}

/// Build an RSS 2.0 document from `(title, link)` pairs.
pub fn rss_document(title: &str, items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, link)| {
            format!(
                "    <item>\n      <title>{title}</title>\n      <link>{link}</link>\n      \
                 <description>About {title}</description>\n      \
                 <pubDate>Wed, 01 Jan 2025 10:00:00 +0000</pubDate>\n    </item>\n"
            )
        })
        .collect();

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n  <channel>\n    \
         <title>{title}</title>\n    <link>https://example.com</link>\n    \
         <description>{title} feed</description>\n{items}  </channel>\n</rss>\n"
    )
}
