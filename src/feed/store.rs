//! Storage seam used by the fetch scheduler and post writer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::repository::{FeedRepository, PostRepository};
use super::types::{Feed, NewPost, Post};
use crate::db::DbPool;
use crate::Result;

/// The storage operations the ingestion pipeline needs.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// The feed that has gone longest without a fetch, or `None` if there
    /// are no feeds.
    async fn next_feed_to_poll(&self) -> Result<Option<Feed>>;

    /// Set a feed's `last_fetched_at`.
    async fn mark_fetched(&self, feed_id: i64, fetched_at: DateTime<Utc>) -> Result<Feed>;

    /// Insert a post; a duplicate URL is a [`crate::GatorError::Conflict`].
    async fn insert_post(&self, post: &NewPost) -> Result<Post>;
}

/// [`FeedStore`] backed by the SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteFeedStore {
    pool: DbPool,
}

impl SqliteFeedStore {
    /// Create a store over the given pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FeedStore for SqliteFeedStore {
    async fn next_feed_to_poll(&self) -> Result<Option<Feed>> {
        FeedRepository::new(&self.pool).next_to_fetch().await
    }

    async fn mark_fetched(&self, feed_id: i64, fetched_at: DateTime<Utc>) -> Result<Feed> {
        FeedRepository::new(&self.pool)
            .mark_fetched(feed_id, fetched_at)
            .await
    }

    async fn insert_post(&self, post: &NewPost) -> Result<Post> {
        PostRepository::new(&self.pool).insert(post).await
    }
}
