use std::time::Duration;

use atom_syndication::Feed;
use backoff::{future::retry, ExponentialBackoff};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use gemini_engine::extract_domain;
use rss::Channel;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Developer news feeds used when `FEED_URLS` is not set.
pub const DEFAULT_FEEDS: [&str; 4] = [
    "https://hnrss.org/frontpage",
    "https://www.infoq.com/development/rss/",
    "https://techcrunch.com/tag/devops/feed/",
    "https://aws.amazon.com/blogs/architecture/feed/",
];

/// HTTP timeout for fetching feeds
pub const FETCH_TIMEOUT_SECS: u64 = 30;
/// How long transient feed failures are retried before the source is skipped
pub const RETRY_WINDOW_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Feed {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to fetch feed {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Feed {url} is neither RSS nor Atom: {reason}")]
    Parse { url: String, reason: String },

    #[error("No feed items fetched from {sources} source(s) ({failed} failed)")]
    NoItems { sources: usize, failed: usize },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FeedError {
    /// Network trouble, rate limits and server errors are worth another try.
    fn is_transient(&self) -> bool {
        match self {
            FeedError::Transport { .. } => true,
            FeedError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// One entry of a syndication feed. Missing fields are empty strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub published_at: String,
    pub source: String,
}

impl FeedItem {
    /// Publish time, if the raw value is RFC 2822 or RFC 3339.
    pub fn published(&self) -> Option<DateTime<Utc>> {
        parse_date(&self.published_at)
    }
}

pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub urls: Vec<String>,
    pub timeout: Duration,
    pub retry_window: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            urls: DEFAULT_FEEDS.iter().map(|url| url.to_string()).collect(),
            timeout: Duration::from_secs(FETCH_TIMEOUT_SECS),
            retry_window: Duration::from_secs(RETRY_WINDOW_SECS),
        }
    }
}

pub struct FeedReader {
    client: reqwest::Client,
    settings: FeedSettings,
}

impl FeedReader {
    pub fn new(settings: FeedSettings) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(FeedError::Client)?;
        Ok(Self { client, settings })
    }

    /// Fetch every feed concurrently and merge the items, newest first.
    /// A failing source is logged and skipped.
    pub async fn fetch_all(&self) -> Result<Vec<FeedItem>, FeedError> {
        let urls = &self.settings.urls;
        let results = join_all(urls.iter().map(|url| self.fetch_with_retry(url))).await;

        let mut batches = Vec::with_capacity(urls.len());
        let mut failed = 0;
        for (url, result) in urls.iter().zip(results) {
            match result {
                Ok(items) => {
                    info!(source = %extract_domain(url), count = items.len(), "Found feed items");
                    batches.push(items);
                }
                Err(e) => {
                    failed += 1;
                    warn!(source = %extract_domain(url), error = %e, "Failed to fetch from source");
                }
            }
        }

        let items = merge_newest_first(batches);
        if items.is_empty() {
            return Err(FeedError::NoItems { sources: urls.len(), failed });
        }
        info!(total_items = items.len(), failed_sources = failed, "Total feed items collected");
        Ok(items)
    }

    /// The most recently published item across all feeds.
    pub async fn latest(&self) -> Result<FeedItem, FeedError> {
        let items = self.fetch_all().await?;
        items
            .into_iter()
            .next()
            .ok_or(FeedError::NoItems { sources: self.settings.urls.len(), failed: 0 })
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<Vec<FeedItem>, FeedError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.settings.retry_window),
            ..Default::default()
        };

        retry(backoff, move || async move {
            self.fetch_feed(url).await.map_err(|e| {
                if e.is_transient() {
                    debug!(source = %extract_domain(url), error = %e, "Transient feed error, retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        })
        .await
    }

    #[instrument(skip(self, url), fields(source = %extract_domain(url)))]
    async fn fetch_feed(&self, url: &str) -> Result<Vec<FeedItem>, FeedError> {
        let transport = |source| FeedError::Transport { url: url.to_string(), source };

        let res = self.client.get(url).send().await.map_err(transport)?;
        let status = res.status();
        if !status.is_success() {
            return Err(FeedError::Status { url: url.to_string(), status: status.as_u16() });
        }
        let content = res.bytes().await.map_err(transport)?;

        parse_feed(&content, url)
    }
}

/// Parse an RSS 2.0 or Atom document. Entries with neither title nor link are skipped.
///
/// When the document as a whole is not well-formed, each `<item>` or `<entry>`
/// block is parsed on its own and the broken ones are dropped.
pub fn parse_feed(content: &[u8], source: &str) -> Result<Vec<FeedItem>, FeedError> {
    let items: Vec<FeedItem> = match Channel::read_from(content) {
        Ok(channel) => channel.items().iter().map(|item| rss_item(item, source)).collect(),
        Err(rss_err) => match Feed::read_from(content) {
            Ok(feed) => feed.entries().iter().map(|entry| atom_entry(entry, source)).collect(),
            Err(atom_err) => {
                let salvaged = salvage_entries(&String::from_utf8_lossy(content), source);
                if salvaged.is_empty() {
                    return Err(FeedError::Parse {
                        url: source.to_string(),
                        reason: format!("rss: {rss_err}; atom: {atom_err}"),
                    });
                }
                warn!(
                    source = %extract_domain(source),
                    error = %rss_err,
                    recovered = salvaged.len(),
                    "Malformed feed, recovered entries individually"
                );
                salvaged
            }
        },
    };

    let total = items.len();
    let items: Vec<FeedItem> = items
        .into_iter()
        .filter(|item| !item.title.is_empty() || !item.link.is_empty())
        .collect();
    if items.len() < total {
        warn!(source = %extract_domain(source), skipped = total - items.len(), "Skipped feed entries without title or link");
    }
    debug!(source = %extract_domain(source), count = items.len(), "Parsed feed items");

    Ok(items)
}

/// Parse every complete `<item>` and `<entry>` block independently.
fn salvage_entries(text: &str, source: &str) -> Vec<FeedItem> {
    let mut items = Vec::new();
    let mut broken = 0;

    for block in element_blocks(text, "item") {
        let wrapped = format!(
            "<rss version=\"2.0\"><channel><title></title><link></link><description></description>{block}</channel></rss>"
        );
        match Channel::read_from(wrapped.as_bytes()) {
            Ok(channel) => items.extend(channel.items().iter().map(|item| rss_item(item, source))),
            Err(_) => broken += 1,
        }
    }
    for block in element_blocks(text, "entry") {
        let wrapped = format!("<feed xmlns=\"http://www.w3.org/2005/Atom\">{block}</feed>");
        match Feed::read_from(wrapped.as_bytes()) {
            Ok(feed) => items.extend(feed.entries().iter().map(|entry| atom_entry(entry, source))),
            Err(_) => broken += 1,
        }
    }

    if broken > 0 {
        warn!(source = %extract_domain(source), broken, "Dropped malformed feed entries");
    }
    items
}

/// Complete `<tag ...>...</tag>` blocks in document order. An unterminated
/// trailing block is ignored.
fn element_blocks<'a>(text: &'a str, tag: &str) -> Vec<&'a str> {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find(&open) {
        let after = &rest[start + open.len()..];
        // `<items>` or `<itemTitle>` are other elements
        if !after.starts_with(|c: char| c == '>' || c.is_ascii_whitespace()) {
            rest = after;
            continue;
        }
        let Some(end) = after.find(&close) else {
            break;
        };
        let block_end = start + open.len() + end + close.len();
        blocks.push(&rest[start..block_end]);
        rest = &rest[block_end..];
    }
    blocks
}

fn rss_item(item: &rss::Item, source: &str) -> FeedItem {
    let link = item
        .link()
        .or_else(|| item.guid().filter(|g| g.is_permalink()).map(|g| g.value()))
        .unwrap_or_default();
    let published_at = item
        .pub_date()
        .or_else(|| {
            item.dublin_core_ext()
                .and_then(|dc| dc.dates().first())
                .map(String::as_str)
        })
        .unwrap_or_default();

    FeedItem {
        title: item.title().unwrap_or_default().trim().to_string(),
        link: link.trim().to_string(),
        published_at: published_at.trim().to_string(),
        source: source.to_string(),
    }
}

fn atom_entry(entry: &atom_syndication::Entry, source: &str) -> FeedItem {
    let link = entry
        .links()
        .iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| entry.links().first())
        .map(|l| l.href())
        .unwrap_or_default();
    let published = entry.published().unwrap_or_else(|| entry.updated());

    FeedItem {
        title: entry.title().value.trim().to_string(),
        link: link.trim().to_string(),
        published_at: published.to_rfc3339(),
        source: source.to_string(),
    }
}

/// Flatten per-feed batches and sort newest first; undated items go last,
/// keeping their original relative order.
pub fn merge_newest_first(batches: Vec<Vec<FeedItem>>) -> Vec<FeedItem> {
    let mut items: Vec<(Option<DateTime<Utc>>, FeedItem)> = batches
        .into_iter()
        .flatten()
        .map(|item| (item.published(), item))
        .collect();
    // Option orders None below Some, so a descending sort puts undated items last
    items.sort_by(|a, b| b.0.cmp(&a.0));
    items.into_iter().map(|(_, item)| item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Dev News</title>
    <link>https://news.example.com</link>
    <description>news</description>
    <item>
      <title><![CDATA[Rust 2.0 announced]]></title>
      <link>https://news.example.com/rust</link>
      <pubDate>Tue, 10 Jun 2025 09:00:00 GMT</pubDate>
    </item>
    <item>
      <title>No date here</title>
      <link>https://news.example.com/undated</link>
    </item>
    <item>
      <description>neither title nor link</description>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Arch Blog</title>
  <id>urn:blog</id>
  <updated>2025-06-11T12:00:00Z</updated>
  <entry>
    <title>Event-driven design</title>
    <id>urn:entry:1</id>
    <link rel="alternate" href="https://blog.example.com/events"/>
    <updated>2025-06-11T12:00:00Z</updated>
  </entry>
</feed>"#;

    fn item(title: &str, published_at: &str) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: format!("https://example.com/{title}"),
            published_at: published_at.to_string(),
            source: "test".to_string(),
        }
    }

    #[test]
    fn test_parse_rss_tolerates_missing_fields() {
        let items = parse_feed(RSS.as_bytes(), "https://news.example.com/rss").unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Rust 2.0 announced");
        assert_eq!(items[0].link, "https://news.example.com/rust");
        assert!(items[0].published().is_some());
        assert_eq!(items[1].published_at, "");
        assert!(items[1].published().is_none());
    }

    #[test]
    fn test_parse_atom() {
        let items = parse_feed(ATOM.as_bytes(), "https://blog.example.com/atom").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Event-driven design");
        assert_eq!(items[0].link, "https://blog.example.com/events");
        assert_eq!(
            items[0].published(),
            Some(DateTime::parse_from_rfc3339("2025-06-11T12:00:00Z").unwrap().with_timezone(&Utc))
        );
    }

    #[test]
    fn test_parse_garbage_fails() {
        let err = parse_feed(b"<html><body>not a feed</body></html>", "https://x.example").unwrap_err();
        assert!(matches!(err, FeedError::Parse { .. }));
    }

    const GOOD_ITEM: &str = "<item><title>Kept</title><link>https://e.x/kept</link><pubDate>Tue, 10 Jun 2025 09:00:00 GMT</pubDate></item>";

    #[test]
    fn test_malformed_entry_does_not_sink_feed() {
        let doc = format!(
            "<rss version=\"2.0\"><channel><title>t</title>{GOOD_ITEM}\
<item><title>AT&T rolls out &nbsp; 5G</title><link>https://e.x/bad</link></item>\
</channel></rss>"
        );
        let items = parse_feed(doc.as_bytes(), "https://e.x/rss").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Kept");
        assert_eq!(items[0].link, "https://e.x/kept");
        assert!(items[0].published().is_some());
    }

    #[test]
    fn test_truncated_document_keeps_complete_items() {
        let doc = format!("<rss version=\"2.0\"><channel><title>t</title>{GOOD_ITEM}<item><title>Cut off");
        let items = parse_feed(doc.as_bytes(), "https://e.x/rss").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Kept");
    }

    #[test]
    fn test_truncated_atom_keeps_complete_entries() {
        let doc = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>t</title>
<entry><title>Whole entry</title><id>urn:1</id><link href="https://e.x/whole"/><updated>2025-06-11T12:00:00Z</updated></entry>
<entry><title>Half"#;
        let items = parse_feed(doc.as_bytes(), "https://e.x/atom").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].link, "https://e.x/whole");
    }

    #[test]
    fn test_element_blocks_match_whole_tag_names() {
        let text = "<items>x</items><item>a</item><itemx>y</itemx><item attr=\"1\">b</item><item>c";
        assert_eq!(element_blocks(text, "item"), vec!["<item>a</item>", "<item attr=\"1\">b</item>"]);
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("Tue, 10 Jun 2025 09:00:00 GMT").is_some());
        assert!(parse_date("2025-06-10T09:00:00+02:00").is_some());
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("").is_none());
    }

    #[test]
    fn test_merge_sorts_newest_first_undated_last() {
        let merged = merge_newest_first(vec![
            vec![item("old", "Mon, 09 Jun 2025 09:00:00 GMT"), item("undated-a", "")],
            vec![
                item("bogus", "not a date"),
                item("new", "2025-06-11T00:00:00Z"),
                item("mid", "Tue, 10 Jun 2025 09:00:00 GMT"),
            ],
        ]);
        let titles: Vec<&str> = merged.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old", "undated-a", "bogus"]);
    }

    #[test]
    fn test_transient_classification() {
        let status = |status| FeedError::Status { url: String::new(), status };
        assert!(status(503).is_transient());
        assert!(status(429).is_transient());
        assert!(!status(404).is_transient());
        assert!(!FeedError::Parse { url: String::new(), reason: String::new() }.is_transient());
    }
}
