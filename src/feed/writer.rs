//! Post writer: turns feed entries into stored posts.

use tracing::debug;

use super::store::FeedStore;
use super::types::{FeedEntry, NewPost};
use crate::datetime::parse_pub_date;
use crate::Result;

/// Counts from writing one batch of entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Posts newly stored.
    pub inserted: usize,
    /// Entries whose URL was already stored.
    pub duplicates: usize,
    /// Entries with no link.
    pub skipped_no_link: usize,
}

impl IngestReport {
    /// Total entries looked at.
    pub fn seen(&self) -> usize {
        self.inserted + self.duplicates + self.skipped_no_link
    }
}

/// Build the post an entry maps to, or `None` if the entry has no link.
pub fn entry_to_post(feed_id: i64, entry: &FeedEntry) -> Option<NewPost> {
    let link = entry.link.trim();
    if link.is_empty() {
        return None;
    }

    let mut post = NewPost::new(feed_id, link);
    if !entry.title.is_empty() {
        post = post.with_title(&entry.title);
    }
    if !entry.description.is_empty() {
        post = post.with_description(&entry.description);
    }
    if let Some(published_at) = entry.pub_date.as_deref().and_then(parse_pub_date) {
        post = post.with_published_at(published_at);
    }
    Some(post)
}

/// Writes entries through a [`FeedStore`], skipping ones already stored.
pub struct PostWriter<'a, S: FeedStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: FeedStore + ?Sized> PostWriter<'a, S> {
    /// Create a writer over the given store.
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Insert entries in document order.
    ///
    /// A unique-URL conflict counts as a duplicate. Any other error stops
    /// the batch; posts inserted before it stay stored.
    pub async fn write(&self, feed_id: i64, entries: &[FeedEntry]) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for entry in entries {
            let Some(post) = entry_to_post(feed_id, entry) else {
                debug!("Skipping entry without link in feed {}: {:?}", feed_id, entry.title);
                report.skipped_no_link += 1;
                continue;
            };

            match self.store.insert_post(&post).await {
                Ok(_) => report.inserted += 1,
                Err(e) if e.is_conflict() => report.duplicates += 1,
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }
}
