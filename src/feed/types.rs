//! Feed types for gator.

use chrono::{DateTime, Utc};

/// Default number of posts shown by `browse`.
pub const DEFAULT_BROWSE_LIMIT: i64 = 2;

/// A subscribed feed.
#[derive(Debug, Clone, PartialEq)]
pub struct Feed {
    /// Feed ID.
    pub id: i64,
    /// Display name given when the feed was added.
    pub name: String,
    /// Feed URL (unique).
    pub url: String,
    /// User who added the feed.
    pub user_id: i64,
    /// When the feed was created.
    pub created_at: DateTime<Utc>,
    /// When the feed was last updated.
    pub updated_at: DateTime<Utc>,
    /// When the scheduler last picked this feed; `None` if never.
    pub last_fetched_at: Option<DateTime<Utc>>,
}

/// New feed for creation.
#[derive(Debug, Clone)]
pub struct NewFeed {
    /// Display name.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Owning user.
    pub user_id: i64,
}

impl NewFeed {
    /// Create a new feed.
    pub fn new(name: impl Into<String>, url: impl Into<String>, user_id: i64) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            user_id,
        }
    }
}

/// A feed together with the name of the user who added it.
#[derive(Debug, Clone)]
pub struct FeedWithOwner {
    /// The feed.
    pub feed: Feed,
    /// Owner's user name.
    pub user_name: String,
}

/// A user following a feed, with the names needed for display.
#[derive(Debug, Clone)]
pub struct FeedFollow {
    /// Follow ID.
    pub id: i64,
    /// Following user.
    pub user_id: i64,
    /// Followed feed.
    pub feed_id: i64,
    /// Following user's name.
    pub user_name: String,
    /// Followed feed's name.
    pub feed_name: String,
    /// Followed feed's URL.
    pub feed_url: String,
    /// When the follow was created.
    pub created_at: DateTime<Utc>,
}

/// A stored post.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Post ID.
    pub id: i64,
    /// Feed this post was ingested from.
    pub feed_id: i64,
    /// Article URL (unique across all posts).
    pub url: String,
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Publication time, if the feed gave a parseable one.
    pub published_at: Option<DateTime<Utc>>,
    /// When the post was stored.
    pub created_at: DateTime<Utc>,
    /// When the post was last updated.
    pub updated_at: DateTime<Utc>,
}

/// New post for creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    /// Feed ID.
    pub feed_id: i64,
    /// Article URL.
    pub url: String,
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Publication time.
    pub published_at: Option<DateTime<Utc>>,
}

impl NewPost {
    /// Create a new post.
    pub fn new(feed_id: i64, url: impl Into<String>) -> Self {
        Self {
            feed_id,
            url: url.into(),
            title: None,
            description: None,
            published_at: None,
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the published date.
    pub fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }
}

/// A post with the name of its feed, for browsing.
#[derive(Debug, Clone)]
pub struct PostWithFeed {
    /// The post.
    pub post: Post,
    /// Name of the feed it came from.
    pub feed_name: String,
}

/// A parsed feed document.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    /// Channel title.
    pub title: String,
    /// Channel link.
    pub link: String,
    /// Channel description.
    pub description: String,
    /// Entries in document order.
    pub entries: Vec<FeedEntry>,
}

/// One `<item>` of a parsed feed.
///
/// An entry has no identity beyond its link, which becomes the post URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedEntry {
    /// Item title.
    pub title: String,
    /// Item link.
    pub link: String,
    /// Item description.
    pub description: String,
    /// Raw `pubDate` text.
    pub pub_date: Option<String>,
}

impl FeedEntry {
    /// Create an entry with just a title and link.
    pub fn new(title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            ..Default::default()
        }
    }
}
