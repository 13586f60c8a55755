//! Feed fetcher.
//!
//! Retrieves an RSS 2.0 document over HTTP and parses it into a
//! [`ParsedFeed`]. Every failure, whether transport, status, size or parse,
//! is reported as [`GatorError::Fetch`]. There are no retries here; the next
//! poll cycle is the retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::config::AggregatorConfig;
use crate::feed::types::{FeedEntry, ParsedFeed};
use crate::{GatorError, Result};

/// Longest named or numeric entity accepted by [`unescape_html`].
const MAX_ENTITY_LENGTH: usize = 10;

/// Source of parsed feeds, keyed by URL.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch and parse the feed at `url`, giving up after `deadline`.
    async fn fetch(&self, url: &str, deadline: Duration) -> Result<ParsedFeed>;
}

/// HTTP feed fetcher.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
    max_feed_size: u64,
}

impl FeedFetcher {
    /// Create a fetcher from the aggregator settings.
    pub fn new(config: &AggregatorConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .timeout(Duration::from_secs(config.total_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| GatorError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_feed_size: config.max_feed_size_bytes,
        })
    }

    /// Fetch and parse a feed, bounded only by the client timeouts.
    pub async fn fetch_feed(&self, url: &str) -> Result<ParsedFeed> {
        validate_url(url).map_err(|e| GatorError::Fetch(e.to_string()))?;

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| GatorError::Fetch(format!("failed to fetch feed: {}", e)))?;

        if !response.status().is_success() {
            return Err(GatorError::Fetch(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > self.max_feed_size {
                return Err(GatorError::Fetch(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    content_length, self.max_feed_size
                )));
            }
        }

        // Chunked bodies carry no length, so the cap is enforced while reading.
        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| GatorError::Fetch(format!("failed to read response: {}", e)))?
        {
            if (bytes.len() + chunk.len()) as u64 > self.max_feed_size {
                return Err(GatorError::Fetch(format!(
                    "feed too large: more than {} bytes",
                    self.max_feed_size
                )));
            }
            bytes.extend_from_slice(&chunk);
        }

        parse_feed(&bytes)
    }

    /// Fetch and parse a feed, failing if the whole operation exceeds `deadline`.
    pub async fn fetch_with_deadline(&self, url: &str, deadline: Duration) -> Result<ParsedFeed> {
        tokio::time::timeout(deadline, self.fetch_feed(url))
            .await
            .map_err(|_| {
                GatorError::Fetch(format!(
                    "deadline of {}s exceeded for {}",
                    deadline.as_secs_f64(),
                    url
                ))
            })?
    }
}

#[async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch(&self, url: &str, deadline: Duration) -> Result<ParsedFeed> {
        self.fetch_with_deadline(url, deadline).await
    }
}

/// Validate a feed URL: it must be absolute http(s) with a host.
pub fn validate_url(url: &str) -> Result<()> {
    let parsed =
        url::Url::parse(url).map_err(|e| GatorError::Validation(format!("invalid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(GatorError::Validation(format!(
                "unsupported URL scheme: {}",
                scheme
            )));
        }
    }

    if parsed.host().is_none() {
        return Err(GatorError::Validation("URL has no host".to_string()));
    }

    Ok(())
}

/// Parse RSS 2.0 bytes into a ParsedFeed.
pub fn parse_feed(bytes: &[u8]) -> Result<ParsedFeed> {
    let channel = ::rss::Channel::read_from(bytes)
        .map_err(|e| GatorError::Fetch(format!("failed to parse feed: {}", e)))?;

    let entries = channel
        .items()
        .iter()
        .map(|item| FeedEntry {
            title: unescape_html(item.title().unwrap_or_default()),
            link: item.link().unwrap_or_default().trim().to_string(),
            description: unescape_html(item.description().unwrap_or_default()),
            pub_date: item.pub_date().map(str::to_string),
        })
        .collect();

    Ok(ParsedFeed {
        title: unescape_html(channel.title()),
        link: channel.link().to_string(),
        description: unescape_html(channel.description()),
        entries,
    })
}

/// Decode HTML entities left in text after XML parsing.
///
/// Feeds often encode markup twice (`&amp;amp;`), so XML decoding leaves one
/// layer of entities behind. Unknown or malformed entities are kept verbatim.
pub fn unescape_html(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('&') {
        result.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        match decode_entity_prefix(after) {
            Some((ch, consumed)) => {
                result.push(ch);
                rest = &after[consumed..];
            }
            None => {
                result.push('&');
                rest = after;
            }
        }
    }
    result.push_str(rest);

    result
}

/// Decode an entity at the start of `s` (just past the `&`).
///
/// Returns the character and the number of bytes consumed, including `;`.
fn decode_entity_prefix(s: &str) -> Option<(char, usize)> {
    let end = s.find(';')?;
    if end == 0 || end > MAX_ENTITY_LENGTH {
        return None;
    }
    decode_entity(&s[..end]).map(|ch| (ch, end + 1))
}

/// Decode an entity name (without `&` and `;`).
fn decode_entity(entity: &str) -> Option<char> {
    let ch = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201c}',
        "rdquo" => '\u{201d}',
        "hellip" => '\u{2026}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        _ if entity.starts_with('#') => {
            return parse_numeric_entity(entity).and_then(char::from_u32);
        }
        _ => return None,
    };
    Some(ch)
}

/// Parse a numeric HTML entity (e.g., "#123" or "#x7B").
fn parse_numeric_entity(entity: &str) -> Option<u32> {
    if let Some(hex) = entity
        .strip_prefix("#x")
        .or_else(|| entity.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()
    } else if let Some(dec) = entity.strip_prefix('#') {
        dec.parse().ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREE_ITEMS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Boot.dev &amp;amp; Friends</title>
    <link>https://blog.boot.dev</link>
    <description>Posts &amp;amp; more</description>
    <item>
      <title>Tom &amp;amp; Jerry</title>
      <link>https://blog.boot.dev/1</link>
      <description>&amp;lt;p&amp;gt;Cats &amp;amp; mice&amp;lt;/p&amp;gt;</description>
      <pubDate>Mon, 02 Jan 2006 15:04:05 -0700</pubDate>
    </item>
    <item>
      <title>Quotes &amp;quot;here&amp;quot;</title>
      <link>https://blog.boot.dev/2</link>
      <description>It&amp;#39;s fine</description>
      <pubDate>not a date</pubDate>
    </item>
    <item>
      <title>Plain &amp; simple</title>
      <link>https://blog.boot.dev/3</link>
      <description>A &amp;#x41; B</description>
    </item>
  </channel>
</rss>"#;

    fn test_config() -> AggregatorConfig {
        AggregatorConfig {
            connect_timeout_secs: 2,
            read_timeout_secs: 2,
            total_timeout_secs: 5,
            ..AggregatorConfig::default()
        }
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/feed.xml").is_ok());
        assert!(validate_url("http://127.0.0.1:8080/feed").is_ok());

        let result = validate_url("ftp://example.com/feed.xml");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("unsupported URL scheme"));

        assert!(validate_url("not a url").is_err());
    }

    #[test]
    fn test_unescape_html_named_entities() {
        assert_eq!(unescape_html("&amp;"), "&");
        assert_eq!(unescape_html("&lt;tag&gt;"), "<tag>");
        assert_eq!(unescape_html("&quot;quoted&quot;"), "\"quoted\"");
        assert_eq!(unescape_html("A&nbsp;B"), "A\u{a0}B");
    }

    #[test]
    fn test_unescape_html_numeric_entities() {
        assert_eq!(unescape_html("&#65;"), "A");
        assert_eq!(unescape_html("&#x41;"), "A");
        assert_eq!(unescape_html("&#x3042;"), "あ");
    }

    #[test]
    fn test_unescape_html_keeps_unknown_and_bare_ampersands() {
        assert_eq!(unescape_html("Q&A"), "Q&A");
        assert_eq!(unescape_html("fish & chips"), "fish & chips");
        assert_eq!(unescape_html("&bogus;"), "&bogus;");
        assert_eq!(unescape_html("&;"), "&;");
        assert_eq!(unescape_html("a && b; c"), "a && b; c");
    }

    #[test]
    fn test_unescape_html_decodes_one_layer_only() {
        assert_eq!(unescape_html("&amp;amp;"), "&amp;");
    }

    #[test]
    fn test_parse_numeric_entity() {
        assert_eq!(parse_numeric_entity("#65"), Some(65));
        assert_eq!(parse_numeric_entity("#x41"), Some(65));
        assert_eq!(parse_numeric_entity("#X41"), Some(65));
        assert_eq!(parse_numeric_entity("invalid"), None);
        assert_eq!(parse_numeric_entity("#xZZ"), None);
    }

    #[test]
    fn test_parse_feed_decodes_entities() {
        let feed = parse_feed(THREE_ITEMS.as_bytes()).unwrap();

        assert_eq!(feed.title, "Boot.dev & Friends");
        assert_eq!(feed.description, "Posts & more");
        assert_eq!(feed.entries.len(), 3);

        assert_eq!(feed.entries[0].title, "Tom & Jerry");
        assert_eq!(feed.entries[0].description, "<p>Cats & mice</p>");
        assert_eq!(feed.entries[1].title, "Quotes \"here\"");
        assert_eq!(feed.entries[1].description, "It's fine");
        assert_eq!(feed.entries[2].title, "Plain & simple");
        assert_eq!(feed.entries[2].description, "A A B");

        for entry in &feed.entries {
            for text in [&entry.title, &entry.description] {
                assert!(!text.contains("&amp;"), "residual entity in {text:?}");
                assert!(!text.contains("&quot;"), "residual entity in {text:?}");
                assert!(!text.contains("&#"), "residual entity in {text:?}");
            }
        }
    }

    #[test]
    fn test_parse_feed_keeps_document_order_and_pub_date_text() {
        let feed = parse_feed(THREE_ITEMS.as_bytes()).unwrap();

        let links: Vec<&str> = feed.entries.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://blog.boot.dev/1",
                "https://blog.boot.dev/2",
                "https://blog.boot.dev/3"
            ]
        );
        assert_eq!(
            feed.entries[0].pub_date.as_deref(),
            Some("Mon, 02 Jan 2006 15:04:05 -0700")
        );
        assert_eq!(feed.entries[1].pub_date.as_deref(), Some("not a date"));
        assert!(feed.entries[2].pub_date.is_none());
    }

    #[test]
    fn test_parse_feed_minimal_item() {
        let rss = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Minimal</title>
    <link>https://example.com</link>
    <description></description>
    <item>
      <link>https://example.com/only-link</link>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(feed.entries.len(), 1);
        assert!(feed.entries[0].title.is_empty());
        assert_eq!(feed.entries[0].link, "https://example.com/only-link");
    }

    #[test]
    fn test_parse_feed_invalid() {
        let err = parse_feed(b"This is not XML").unwrap_err();
        assert!(matches!(err, GatorError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_feed_over_http() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/index.xml")
            .match_header("user-agent", "gator")
            .with_status(200)
            .with_header("content-type", "application/rss+xml")
            .with_body(THREE_ITEMS)
            .create_async()
            .await;

        let fetcher = FeedFetcher::new(&test_config()).unwrap();
        let url = format!("{}/index.xml", server.url());
        let feed = fetcher
            .fetch_with_deadline(&url, Duration::from_secs(5))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(feed.entries.len(), 3);
        assert_eq!(feed.entries[0].title, "Tom & Jerry");
    }

    #[tokio::test]
    async fn test_fetch_feed_http_error_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.xml")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = FeedFetcher::new(&test_config()).unwrap();
        let url = format!("{}/missing.xml", server.url());
        let err = fetcher
            .fetch_with_deadline(&url, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, GatorError::Fetch(_)));
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_fetch_feed_malformed_body_is_fetch_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/broken.xml")
            .with_status(200)
            .with_body("<rss><channel><title>cut off")
            .create_async()
            .await;

        let fetcher = FeedFetcher::new(&test_config()).unwrap();
        let url = format!("{}/broken.xml", server.url());
        let err = fetcher
            .fetch_with_deadline(&url, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, GatorError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_feed_too_large() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/big.xml")
            .with_status(200)
            .with_body(THREE_ITEMS)
            .create_async()
            .await;

        let config = AggregatorConfig {
            max_feed_size_bytes: 16,
            ..test_config()
        };
        let fetcher = FeedFetcher::new(&config).unwrap();
        let url = format!("{}/big.xml", server.url());
        let err = fetcher
            .fetch_with_deadline(&url, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("feed too large"));
    }

    #[tokio::test]
    async fn test_fetch_chunked_body_stops_at_size_limit() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        const BODY_SIZE: usize = 10 * 1024 * 1024;
        const CHUNK_SIZE: usize = 64 * 1024;

        // Chunked response with no Content-Length; returns the bytes it
        // managed to send before the client hung up.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;

            let head = "HTTP/1.1 200 OK\r\n\
                        Content-Type: application/rss+xml\r\n\
                        Transfer-Encoding: chunked\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return 0;
            }

            let data = vec![b'x'; CHUNK_SIZE];
            let mut sent = 0;
            while sent < BODY_SIZE {
                let mut frame = format!("{:x}\r\n", CHUNK_SIZE).into_bytes();
                frame.extend_from_slice(&data);
                frame.extend_from_slice(b"\r\n");
                if socket.write_all(&frame).await.is_err() {
                    return sent;
                }
                sent += CHUNK_SIZE;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
            sent
        });

        let config = AggregatorConfig {
            max_feed_size_bytes: 1024,
            ..test_config()
        };
        let fetcher = FeedFetcher::new(&config).unwrap();
        let url = format!("http://{}/endless.xml", addr);
        let err = fetcher
            .fetch_with_deadline(&url, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("feed too large"));
        assert!(!err.to_string().contains(&BODY_SIZE.to_string()));

        let sent = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server kept writing after the client gave up")
            .unwrap();
        assert!(sent < BODY_SIZE, "whole body was delivered ({sent} bytes)");
    }

    #[tokio::test]
    async fn test_fetch_connection_refused_is_fetch_error() {
        // Bind then drop a listener to get a port nothing is listening on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = FeedFetcher::new(&test_config()).unwrap();
        let url = format!("http://{}/feed.xml", addr);
        let err = fetcher
            .fetch_with_deadline(&url, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, GatorError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_fetch_deadline_exceeded() {
        // Accept the connection but never answer.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let fetcher = FeedFetcher::new(&test_config()).unwrap();
        let url = format!("http://{}/slow.xml", addr);
        let err = fetcher
            .fetch_with_deadline(&url, Duration::from_millis(200))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("deadline"));
        server.abort();
    }
}
