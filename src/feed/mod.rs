//! Feed subscriptions and the ingestion pipeline.
//!
//! - [`fetcher`]: downloads and parses RSS 2.0 documents
//! - [`scheduler`]: picks the stalest feed and runs one fetch cycle
//! - [`writer`]: stores entries as posts, skipping URLs already seen
//! - [`aggregator`]: the polling loop around the scheduler
//! - [`repository`]: SQL access for feeds, follows and posts

pub mod aggregator;
pub mod fetcher;
pub mod repository;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod writer;

pub use aggregator::{
    parse_interval, start_aggregator, Aggregator, AggregatorHandle, AggregatorMessage,
};
pub use fetcher::{parse_feed, unescape_html, validate_url, FeedFetcher, FeedSource};
pub use repository::{FeedFollowRepository, FeedRepository, PostRepository};
pub use scheduler::{CycleOutcome, FetchScheduler};
pub use store::{FeedStore, SqliteFeedStore};
pub use types::{
    Feed, FeedEntry, FeedFollow, FeedWithOwner, NewFeed, NewPost, ParsedFeed, Post, PostWithFeed,
    DEFAULT_BROWSE_LIMIT,
};
pub use writer::{entry_to_post, IngestReport, PostWriter};
