//! Feed commands: addfeed, feeds, follow, following, unfollow, browse.

use std::io::Write;

use tracing::info;

use super::AppState;
use crate::datetime::format_display;
use crate::db::User;
use crate::feed::{validate_url, FeedFollowRepository, FeedRepository, NewFeed, PostRepository};
use crate::{GatorError, Result};

pub(super) async fn add<W: Write>(
    state: &AppState,
    user: &User,
    name: &str,
    url: &str,
    out: &mut W,
) -> Result<()> {
    validate_url(url)?;

    let feed = FeedRepository::new(state.db.pool())
        .create(&NewFeed::new(name, url, user.id))
        .await?;
    FeedFollowRepository::new(state.db.pool())
        .create(user.id, feed.id)
        .await?;

    info!("User {} added feed {} ({})", user.name, feed.name, feed.url);
    writeln!(out, "Added feed {} ({})", feed.name, feed.url)?;
    writeln!(out, "{} now follows {}", user.name, feed.name)?;
    Ok(())
}

pub(super) async fn list<W: Write>(state: &AppState, out: &mut W) -> Result<()> {
    let feeds = FeedRepository::new(state.db.pool()).list_with_owner().await?;

    for entry in feeds {
        writeln!(
            out,
            "* {} ({}) added by {}",
            entry.feed.name, entry.feed.url, entry.user_name
        )?;
    }
    Ok(())
}

pub(super) async fn follow<W: Write>(
    state: &AppState,
    user: &User,
    url: &str,
    out: &mut W,
) -> Result<()> {
    let feed = FeedRepository::new(state.db.pool())
        .get_by_url(url)
        .await?
        .ok_or_else(|| GatorError::NotFound(format!("feed {url}")))?;

    let follow = FeedFollowRepository::new(state.db.pool())
        .create(user.id, feed.id)
        .await?;

    writeln!(out, "{} now follows {}", follow.user_name, follow.feed_name)?;
    Ok(())
}

pub(super) async fn following<W: Write>(state: &AppState, user: &User, out: &mut W) -> Result<()> {
    let follows = FeedFollowRepository::new(state.db.pool())
        .list_for_user(user.id)
        .await?;

    for follow in follows {
        writeln!(out, "* {} ({})", follow.feed_name, follow.feed_url)?;
    }
    Ok(())
}

pub(super) async fn unfollow<W: Write>(
    state: &AppState,
    user: &User,
    url: &str,
    out: &mut W,
) -> Result<()> {
    let removed = FeedFollowRepository::new(state.db.pool())
        .delete_for_user_url(user.id, url)
        .await?;
    if !removed {
        return Err(GatorError::NotFound(format!(
            "follow of {url} by {}",
            user.name
        )));
    }

    writeln!(out, "{} unfollowed {}", user.name, url)?;
    Ok(())
}

pub(super) async fn browse<W: Write>(
    state: &AppState,
    user: &User,
    limit: i64,
    out: &mut W,
) -> Result<()> {
    let posts = PostRepository::new(state.db.pool())
        .list_for_user(user.id, limit)
        .await?;

    if posts.is_empty() {
        writeln!(out, "No posts yet")?;
        return Ok(());
    }

    for entry in posts {
        let post = entry.post;
        let published = post
            .published_at
            .as_ref()
            .map(format_display)
            .unwrap_or_else(|| "unknown date".to_string());

        writeln!(out, "{} from {}", published, entry.feed_name)?;
        writeln!(out, "--- {} ---", post.title.as_deref().unwrap_or("(untitled)"))?;
        if let Some(description) = post.description.as_deref() {
            writeln!(out, "    {}", description)?;
        }
        writeln!(out, "Link: {}", post.url)?;
        writeln!(out, "=====================================")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{exec, state};
    use crate::feed::{FeedRepository, NewPost, PostRepository};
    use crate::GatorError;
    use chrono::{TimeZone, Utc};

    const BLOG: &str = "https://blog.example.com/rss";

    #[tokio::test]
    async fn test_addfeed_follows_feed() {
        let (mut state, _dir) = state().await;
        exec(&mut state, &["register", "alice"]).await.unwrap();

        let out = exec(&mut state, &["addfeed", "Blog", BLOG]).await.unwrap();
        assert!(out.contains("alice now follows Blog"));

        let following = exec(&mut state, &["following"]).await.unwrap();
        assert_eq!(following, format!("* Blog ({BLOG})\n"));
    }

    #[tokio::test]
    async fn test_addfeed_rejects_bad_url() {
        let (mut state, _dir) = state().await;
        exec(&mut state, &["register", "alice"]).await.unwrap();

        let err = exec(&mut state, &["addfeed", "Blog", "ftp://blog.example.com"])
            .await
            .unwrap_err();
        assert!(matches!(err, GatorError::Validation(_)));
    }

    #[tokio::test]
    async fn test_addfeed_duplicate_url_fails() {
        let (mut state, _dir) = state().await;
        exec(&mut state, &["register", "alice"]).await.unwrap();
        exec(&mut state, &["addfeed", "Blog", BLOG]).await.unwrap();

        let err = exec(&mut state, &["addfeed", "Again", BLOG]).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_feeds_lists_owner() {
        let (mut state, _dir) = state().await;
        exec(&mut state, &["register", "alice"]).await.unwrap();
        exec(&mut state, &["addfeed", "Blog", BLOG]).await.unwrap();

        let out = exec(&mut state, &["feeds"]).await.unwrap();
        assert_eq!(out, format!("* Blog ({BLOG}) added by alice\n"));
    }

    #[tokio::test]
    async fn test_follow_and_unfollow() {
        let (mut state, _dir) = state().await;
        exec(&mut state, &["register", "alice"]).await.unwrap();
        exec(&mut state, &["addfeed", "Blog", BLOG]).await.unwrap();
        exec(&mut state, &["register", "bob"]).await.unwrap();

        let out = exec(&mut state, &["follow", BLOG]).await.unwrap();
        assert_eq!(out, "bob now follows Blog\n");

        let err = exec(&mut state, &["follow", BLOG]).await.unwrap_err();
        assert!(err.is_conflict());

        exec(&mut state, &["unfollow", BLOG]).await.unwrap();
        assert_eq!(exec(&mut state, &["following"]).await.unwrap(), "");

        let err = exec(&mut state, &["unfollow", BLOG]).await.unwrap_err();
        assert!(matches!(err, GatorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_follow_unknown_feed_fails() {
        let (mut state, _dir) = state().await;
        exec(&mut state, &["register", "alice"]).await.unwrap();

        let err = exec(&mut state, &["follow", BLOG]).await.unwrap_err();
        assert!(matches!(err, GatorError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_browse_shows_newest_posts() {
        let (mut state, _dir) = state().await;
        exec(&mut state, &["register", "alice"]).await.unwrap();
        exec(&mut state, &["addfeed", "Blog", BLOG]).await.unwrap();

        let feed = FeedRepository::new(state.db.pool())
            .get_by_url(BLOG)
            .await
            .unwrap()
            .unwrap();
        let posts = PostRepository::new(state.db.pool());
        for day in 1..=3 {
            posts
                .insert(
                    &NewPost::new(feed.id, format!("https://blog.example.com/{day}"))
                        .with_title(format!("Day {day}"))
                        .with_published_at(Utc.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap()),
                )
                .await
                .unwrap();
        }

        let out = exec(&mut state, &["browse"]).await.unwrap();
        assert!(out.contains("--- Day 3 ---"));
        assert!(out.contains("--- Day 2 ---"));
        assert!(!out.contains("--- Day 1 ---"));
        assert!(out.starts_with("2025-03-03 09:00 UTC from Blog\n"));

        let out = exec(&mut state, &["browse", "5"]).await.unwrap();
        assert!(out.contains("--- Day 1 ---"));
    }

    #[tokio::test]
    async fn test_browse_without_posts() {
        let (mut state, _dir) = state().await;
        exec(&mut state, &["register", "alice"]).await.unwrap();

        assert_eq!(exec(&mut state, &["browse"]).await.unwrap(), "No posts yet\n");
    }
}
