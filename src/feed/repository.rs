//! Feed, follow and post repositories for gator.

use chrono::{DateTime, Utc};

use super::types::{Feed, FeedFollow, FeedWithOwner, NewFeed, NewPost, Post, PostWithFeed};
use crate::datetime::{format_timestamp, parse_timestamp};
use crate::db::DbPool;
use crate::error::map_insert_error;
use crate::{GatorError, Result};

/// Row type for a feed from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedRow {
    id: i64,
    name: String,
    url: String,
    user_id: i64,
    created_at: String,
    updated_at: String,
    last_fetched_at: Option<String>,
}

impl From<FeedRow> for Feed {
    fn from(row: FeedRow) -> Self {
        Feed {
            id: row.id,
            name: row.name,
            url: row.url,
            user_id: row.user_id,
            created_at: parse_timestamp(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_timestamp(&row.updated_at).unwrap_or_else(Utc::now),
            last_fetched_at: row.last_fetched_at.and_then(|s| parse_timestamp(&s)),
        }
    }
}

/// Row type for a feed joined with its owner's name.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedWithOwnerRow {
    #[sqlx(flatten)]
    feed: FeedRow,
    user_name: String,
}

impl From<FeedWithOwnerRow> for FeedWithOwner {
    fn from(row: FeedWithOwnerRow) -> Self {
        FeedWithOwner {
            feed: Feed::from(row.feed),
            user_name: row.user_name,
        }
    }
}

/// Row type for a follow joined with user and feed names.
#[derive(Debug, Clone, sqlx::FromRow)]
struct FeedFollowRow {
    id: i64,
    user_id: i64,
    feed_id: i64,
    user_name: String,
    feed_name: String,
    feed_url: String,
    created_at: String,
}

impl From<FeedFollowRow> for FeedFollow {
    fn from(row: FeedFollowRow) -> Self {
        FeedFollow {
            id: row.id,
            user_id: row.user_id,
            feed_id: row.feed_id,
            user_name: row.user_name,
            feed_name: row.feed_name,
            feed_url: row.feed_url,
            created_at: parse_timestamp(&row.created_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Row type for a post from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostRow {
    id: i64,
    feed_id: i64,
    url: String,
    title: Option<String>,
    description: Option<String>,
    published_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<PostRow> for Post {
    fn from(row: PostRow) -> Self {
        Post {
            id: row.id,
            feed_id: row.feed_id,
            url: row.url,
            title: row.title,
            description: row.description,
            published_at: row.published_at.and_then(|s| parse_timestamp(&s)),
            created_at: parse_timestamp(&row.created_at).unwrap_or_else(Utc::now),
            updated_at: parse_timestamp(&row.updated_at).unwrap_or_else(Utc::now),
        }
    }
}

/// Row type for a post joined with its feed's name.
#[derive(Debug, Clone, sqlx::FromRow)]
struct PostWithFeedRow {
    #[sqlx(flatten)]
    post: PostRow,
    feed_name: String,
}

impl From<PostWithFeedRow> for PostWithFeed {
    fn from(row: PostWithFeedRow) -> Self {
        PostWithFeed {
            post: Post::from(row.post),
            feed_name: row.feed_name,
        }
    }
}

/// Repository for feed operations.
pub struct FeedRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new feed.
    ///
    /// Returns [`GatorError::Conflict`] if a feed with this URL exists.
    pub async fn create(&self, feed: &NewFeed) -> Result<Feed> {
        let now = format_timestamp(&Utc::now());
        let result = sqlx::query(
            r#"
            INSERT INTO feeds (name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&feed.name)
        .bind(&feed.url)
        .bind(feed.user_id)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("feed {}", feed.url)))?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| GatorError::NotFound("feed".to_string()))
    }

    /// Get a feed by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(
            r#"
            SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
            FROM feeds
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(row.map(Feed::from))
    }

    /// Get a feed by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(
            r#"
            SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
            FROM feeds
            WHERE url = ?
            "#,
        )
        .bind(url)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(row.map(Feed::from))
    }

    /// List all feeds with their owners' names (ordered by registration order).
    pub async fn list_with_owner(&self) -> Result<Vec<FeedWithOwner>> {
        let rows = sqlx::query_as::<_, FeedWithOwnerRow>(
            r#"
            SELECT f.id, f.name, f.url, f.user_id, f.created_at, f.updated_at,
                   f.last_fetched_at, u.name AS user_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.id ASC
            "#,
        )
        .fetch_all(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(FeedWithOwner::from).collect())
    }

    /// Get the feed that has gone longest without a fetch.
    ///
    /// Never-fetched feeds come first; ties go to the oldest feed.
    pub async fn next_to_fetch(&self) -> Result<Option<Feed>> {
        let row = sqlx::query_as::<_, FeedRow>(
            r#"
            SELECT id, name, url, user_id, created_at, updated_at, last_fetched_at
            FROM feeds
            ORDER BY last_fetched_at IS NOT NULL, last_fetched_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(row.map(Feed::from))
    }

    /// Record that a feed was fetched at `fetched_at`.
    pub async fn mark_fetched(&self, id: i64, fetched_at: DateTime<Utc>) -> Result<Feed> {
        let at = format_timestamp(&fetched_at);
        let result = sqlx::query(
            r#"
            UPDATE feeds
            SET last_fetched_at = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&at)
        .bind(&at)
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(GatorError::NotFound(format!("feed {id}")));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| GatorError::NotFound(format!("feed {id}")))
    }

    /// Count all feeds.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM feeds")
            .fetch_one(self.pool)
            .await
            .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(count)
    }
}

/// Repository for feed follow operations.
pub struct FeedFollowRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> FeedFollowRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Make a user follow a feed.
    ///
    /// Returns [`GatorError::Conflict`] if the user already follows it.
    pub async fn create(&self, user_id: i64, feed_id: i64) -> Result<FeedFollow> {
        let now = format_timestamp(&Utc::now());
        let result = sqlx::query(
            r#"
            INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .map_err(|e| map_insert_error(e, "feed follow"))?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| GatorError::NotFound("feed follow".to_string()))
    }

    /// Get a follow by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<FeedFollow>> {
        let row = sqlx::query_as::<_, FeedFollowRow>(
            r#"
            SELECT ff.id, ff.user_id, ff.feed_id, u.name AS user_name,
                   f.name AS feed_name, f.url AS feed_url, ff.created_at
            FROM feed_follows ff
            JOIN users u ON u.id = ff.user_id
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(row.map(FeedFollow::from))
    }

    /// List the feeds a user follows (ordered by follow time).
    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<FeedFollow>> {
        let rows = sqlx::query_as::<_, FeedFollowRow>(
            r#"
            SELECT ff.id, ff.user_id, ff.feed_id, u.name AS user_name,
                   f.name AS feed_name, f.url AS feed_url, ff.created_at
            FROM feed_follows ff
            JOIN users u ON u.id = ff.user_id
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.user_id = ?
            ORDER BY ff.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(FeedFollow::from).collect())
    }

    /// Remove a user's follow of the feed with the given URL.
    ///
    /// Returns false if the user was not following it.
    pub async fn delete_for_user_url(&self, user_id: i64, url: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM feed_follows
            WHERE user_id = ? AND feed_id IN (SELECT id FROM feeds WHERE url = ?)
            "#,
        )
        .bind(user_id)
        .bind(url)
        .execute(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}

/// Repository for post operations.
pub struct PostRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> PostRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a post.
    ///
    /// The unique URL constraint is the deduplication mechanism: inserting a
    /// URL that is already stored returns [`GatorError::Conflict`].
    pub async fn insert(&self, post: &NewPost) -> Result<Post> {
        let now = format_timestamp(&Utc::now());
        let published_at = post.published_at.as_ref().map(format_timestamp);

        let result = sqlx::query(
            r#"
            INSERT INTO posts (feed_id, url, title, description, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(post.feed_id)
        .bind(&post.url)
        .bind(&post.title)
        .bind(&post.description)
        .bind(&published_at)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .map_err(|e| map_insert_error(e, &format!("post {}", post.url)))?;

        self.get_by_id(result.last_insert_rowid())
            .await?
            .ok_or_else(|| GatorError::NotFound("post".to_string()))
    }

    /// Get a post by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Post>> {
        let row = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, feed_id, url, title, description, published_at, created_at, updated_at
            FROM posts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(row.map(Post::from))
    }

    /// List a feed's posts in insertion order.
    pub async fn list_by_feed(&self, feed_id: i64) -> Result<Vec<Post>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT id, feed_id, url, title, description, published_at, created_at, updated_at
            FROM posts
            WHERE feed_id = ?
            ORDER BY id ASC
            "#,
        )
        .bind(feed_id)
        .fetch_all(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(Post::from).collect())
    }

    /// Count a feed's posts.
    pub async fn count_by_feed(&self, feed_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(self.pool)
            .await
            .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(count)
    }

    /// Newest posts from the feeds a user follows.
    ///
    /// Posts without a publication date sort after dated ones.
    pub async fn list_for_user(&self, user_id: i64, limit: i64) -> Result<Vec<PostWithFeed>> {
        let rows = sqlx::query_as::<_, PostWithFeedRow>(
            r#"
            SELECT p.id, p.feed_id, p.url, p.title, p.description, p.published_at,
                   p.created_at, p.updated_at, f.name AS feed_name
            FROM posts p
            JOIN feeds f ON f.id = p.feed_id
            JOIN feed_follows ff ON ff.feed_id = p.feed_id
            WHERE ff.user_id = ?
            ORDER BY p.published_at IS NULL, p.published_at DESC, p.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await
        .map_err(|e| GatorError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(PostWithFeed::from).collect())
    }
}
