// src/news/mod.rs
//
// News aggregation pipeline: concurrent fan-out over the configured feeds,
// per-feed failure tolerance, image resolution, and a merged timeline
// sorted newest-first. The pipeline is a pure function of (feed list,
// fetcher); it holds no state between requests.

pub mod feed;
pub mod image;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::warn;

use crate::news::feed::{FeedFetcher, ParsedFeed};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "pubDate", skip_serializing_if = "Option::is_none")]
    pub pub_date: Option<String>,
    #[serde(rename = "contentSnippet", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Always non-empty; the placeholder strategy backstops every item.
    pub image: String,
    /// Originating feed title; omitted for single-source responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsResponse {
    /// Single-source responses carry the feed title here; multi-source
    /// responses omit it and label each item instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub items: Vec<NewsItem>,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("feed_fetch_errors_total", "Feed fetches that failed.");
        describe_counter!("feed_items_parsed_total", "Items parsed from feeds.");
        describe_histogram!("feed_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Fetch every configured feed concurrently and merge the survivors into
/// one timeline. Individual fetch failures are logged and dropped; only
/// zero successes is an error.
pub async fn aggregate(fetcher: &dyn FeedFetcher, feed_urls: &[String]) -> Result<NewsResponse> {
    ensure_metrics_described();

    let fetches = feed_urls.iter().map(|url| async move {
        match fetcher.fetch(url).await {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(error = ?e, url = %url, "feed fetch failed, dropping source");
                counter!("feed_fetch_errors_total").increment(1);
                None
            }
        }
    });
    let feeds: Vec<ParsedFeed> = join_all(fetches).await.into_iter().flatten().collect();

    if feeds.is_empty() {
        bail!(
            "no feeds available: all {} configured fetches failed",
            feed_urls.len()
        );
    }

    Ok(merge_feeds(feeds))
}

/// Normalize, label, and sort the fetched feeds into one response.
/// `sort_by` is stable, so items with equal timestamps keep feed order.
fn merge_feeds(feeds: Vec<ParsedFeed>) -> NewsResponse {
    let single_source = feeds.len() == 1;
    let title = feeds
        .first()
        .filter(|f| single_source && !f.items.is_empty())
        .and_then(|f| f.title.clone());

    let mut dated: Vec<(DateTime<Utc>, NewsItem)> = Vec::new();
    for parsed in feeds {
        let source = if single_source { None } else { parsed.title };
        for item in parsed.items {
            let ts = item
                .pub_date
                .as_deref()
                .and_then(feed::parse_timestamp)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
            let image = image::resolve_image(&item);
            dated.push((
                ts,
                NewsItem {
                    title: item.title,
                    pub_date: item.pub_date,
                    summary: item.summary,
                    link: item.link,
                    image,
                    source: source.clone(),
                },
            ));
        }
    }
    dated.sort_by(|a, b| b.0.cmp(&a.0));

    NewsResponse {
        title,
        items: dated.into_iter().map(|(_, item)| item).collect(),
    }
}

/// Built-in items served in mock mode, so the dashboard UI can be developed
/// without live network access or credentials.
pub fn mock_response() -> NewsResponse {
    const MOCK_ITEMS: &[(&str, &str, &str)] = &[
        (
            "SpaceX successfully launches Starship on 5th test flight",
            "Sat, 31 Jan 2026 12:00:00 GMT",
            "The massive rocket achieved orbit and returned safely to the launch tower.",
        ),
        (
            "New breakthrough in fusion energy announced by scientists",
            "Sat, 31 Jan 2026 10:30:00 GMT",
            "Researchers have sustained a net energy gain for over 10 minutes.",
        ),
        (
            "Global weather patterns shift as El Ni\u{f1}o subsides",
            "Sat, 31 Jan 2026 09:15:00 GMT",
            "Meteorologists predict cooler summers for the northern hemisphere.",
        ),
    ];

    NewsResponse {
        title: None,
        items: MOCK_ITEMS
            .iter()
            .map(|(title, pub_date, snippet)| NewsItem {
                title: Some((*title).to_string()),
                pub_date: Some((*pub_date).to_string()),
                summary: Some((*snippet).to_string()),
                link: Some("#".to_string()),
                image: image::placeholder_for(title),
                source: None,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::feed::RawFeedItem;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct MapFetcher {
        feeds: HashMap<String, ParsedFeed>,
    }

    #[async_trait]
    impl FeedFetcher for MapFetcher {
        async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
            self.feeds
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow!("connection refused: {url}"))
        }
    }

    fn item(title: &str, pub_date: Option<&str>) -> RawFeedItem {
        RawFeedItem {
            title: Some(title.to_string()),
            pub_date: pub_date.map(str::to_string),
            link: Some(format!("https://example.com/{title}")),
            ..Default::default()
        }
    }

    fn feed(title: &str, items: Vec<RawFeedItem>) -> ParsedFeed {
        ParsedFeed {
            title: Some(title.to_string()),
            items,
        }
    }

    #[tokio::test]
    async fn merges_feeds_sorted_descending_with_bad_dates_last() {
        let mut feeds = HashMap::new();
        feeds.insert(
            "https://a/rss".to_string(),
            feed(
                "Feed A",
                vec![
                    item("old", Some("Fri, 30 Jan 2026 08:00:00 GMT")),
                    item("undated", None),
                ],
            ),
        );
        feeds.insert(
            "https://b/rss".to_string(),
            feed(
                "Feed B",
                vec![
                    item("new", Some("Sat, 31 Jan 2026 08:00:00 GMT")),
                    item("mangled", Some("not a date")),
                ],
            ),
        );
        let fetcher = MapFetcher { feeds };

        let out = aggregate(
            &fetcher,
            &["https://a/rss".to_string(), "https://b/rss".to_string()],
        )
        .await
        .unwrap();

        let titles: Vec<_> = out
            .items
            .iter()
            .map(|i| i.title.as_deref().unwrap())
            .collect();
        assert_eq!(titles, vec!["new", "old", "undated", "mangled"]);
        // Two feeds: no aggregate title, per-item source labels instead.
        assert!(out.title.is_none());
        assert!(out.items.iter().all(|i| i.source.is_some()));
        // Items with the zero-timestamp tie keep feed order (A before B).
        assert_eq!(out.items[2].source.as_deref(), Some("Feed A"));
        assert_eq!(out.items[3].source.as_deref(), Some("Feed B"));
    }

    #[tokio::test]
    async fn single_feed_sets_response_title_and_drops_source_labels() {
        let mut feeds = HashMap::new();
        feeds.insert(
            "https://solo/rss".to_string(),
            feed("Solo Wire", vec![item("only", None)]),
        );
        let fetcher = MapFetcher { feeds };

        let out = aggregate(&fetcher, &["https://solo/rss".to_string()])
            .await
            .unwrap();
        assert_eq!(out.title.as_deref(), Some("Solo Wire"));
        assert!(out.items[0].source.is_none());
    }

    #[tokio::test]
    async fn partial_failure_keeps_survivors() {
        let mut feeds = HashMap::new();
        feeds.insert(
            "https://up/rss".to_string(),
            feed("Up", vec![item("alive", None)]),
        );
        let fetcher = MapFetcher { feeds };

        let out = aggregate(
            &fetcher,
            &["https://down/rss".to_string(), "https://up/rss".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(out.items.len(), 1);
        // Only one feed survived, so it reduces to a single-source response.
        assert_eq!(out.title.as_deref(), Some("Up"));
    }

    #[tokio::test]
    async fn zero_successes_is_an_error() {
        let fetcher = MapFetcher {
            feeds: HashMap::new(),
        };
        let err = aggregate(&fetcher, &["https://gone/rss".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no feeds available"));
    }

    #[tokio::test]
    async fn every_item_gets_a_non_empty_image() {
        let mut feeds = HashMap::new();
        feeds.insert(
            "https://plain/rss".to_string(),
            feed("Plain", vec![item("bare item", None)]),
        );
        let fetcher = MapFetcher { feeds };

        let out = aggregate(&fetcher, &["https://plain/rss".to_string()])
            .await
            .unwrap();
        assert!(!out.items[0].image.is_empty());
        assert!(out.items[0].image.starts_with("https://picsum.photos/seed/"));
    }

    #[test]
    fn mock_response_is_fully_decorated() {
        let out = mock_response();
        assert!(out.title.is_none());
        assert_eq!(out.items.len(), 3);
        for it in &out.items {
            assert!(it.image.starts_with("https://picsum.photos/seed/"));
            assert_eq!(it.link.as_deref(), Some("#"));
        }
        // Same title, same placeholder.
        assert_eq!(out.items[0].image, mock_response().items[0].image);
    }
}
