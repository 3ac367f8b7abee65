// src/news/feed.rs
//
// Feed fetching and parsing. Upstream feeds are RSS 2.0 or Atom with wildly
// inconsistent media encodings; everything is folded into one ParsedFeed
// shape so the pipeline never cares which dialect it came from.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;

/// A syndicated feed reduced to the fields the pipeline consumes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub items: Vec<RawFeedItem>,
}

/// One upstream article, as fetched. Media encodings are kept separate so
/// the image-resolution chain can rank them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeedItem {
    pub title: Option<String>,
    /// Loosely formatted publish timestamp, kept verbatim.
    pub pub_date: Option<String>,
    pub link: Option<String>,
    /// Full content markup (content:encoded / Atom content), if any.
    pub content: Option<String>,
    /// Plain-text snippet derived from the content or description.
    pub summary: Option<String>,
    /// Raw description field, markup and all.
    pub description: Option<String>,
    pub media: Vec<MediaAttachment>,
    pub enclosure: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaAttachment {
    pub url: Option<String>,
    pub medium: Option<String>,
}

/// Fetch capability consumed by the news pipeline; faked in tests.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed>;
}

pub struct HttpFeedFetcher {
    client: reqwest::Client,
}

impl HttpFeedFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .user_agent("hemma-dashboard/0.1")
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }
}

impl Default for HttpFeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<ParsedFeed> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("requesting feed {url}"))?
            .error_for_status()
            .with_context(|| format!("feed {url} returned an error status"))?;
        let body = resp
            .text()
            .await
            .with_context(|| format!("reading feed body from {url}"))?;
        parse_feed(&body).with_context(|| format!("parsing feed {url}"))
    }
}

/// Parse a feed document, trying RSS 2.0 first and Atom second.
pub fn parse_feed(body: &str) -> Result<ParsedFeed> {
    let t0 = std::time::Instant::now();

    let parsed = match from_str::<Rss>(body) {
        Ok(rss) => rss.into_parsed(),
        Err(rss_err) => from_str::<AtomFeed>(body)
            .map(AtomFeed::into_parsed)
            .map_err(|atom_err| {
                anyhow::anyhow!("not RSS ({rss_err}) and not Atom ({atom_err})")
            })?,
    };

    histogram!("feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("feed_items_parsed_total").increment(parsed.items.len() as u64);
    Ok(parsed)
}

/// Parse the loose timestamp formats feeds use. RFC 2822 dominates RSS,
/// RFC 3339 dominates Atom; a bare naive format shows up in the wild.
pub fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|| parse_rfc2822_lenient(ts))
        .or_else(|| {
            DateTime::parse_from_rfc3339(ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
        .or_else(|| {
            NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
        })
}

/// RSS dates frequently carry a weekday label that contradicts the date,
/// which strict RFC 2822 parsing rejects. Drop the weekday and parse the
/// rest, taking a named zone suffix (GMT, UTC, ...) as UTC.
fn parse_rfc2822_lenient(ts: &str) -> Option<DateTime<Utc>> {
    let rest = ts
        .split_once(',')
        .map(|(_, r)| r.trim())
        .unwrap_or_else(|| ts.trim());

    if let Ok(dt) = DateTime::parse_from_str(rest, "%d %b %Y %H:%M:%S %z") {
        return Some(dt.with_timezone(&Utc));
    }

    let no_zone = rest
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .trim();
    NaiveDateTime::parse_from_str(no_zone, "%d %b %Y %H:%M:%S")
        .ok()
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

/// HTML-decode and tag-strip markup into a one-line plain-text snippet.
pub fn strip_markup(s: &str) -> String {
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());

    let decoded = html_escape::decode_html_entities(s).to_string();
    let no_tags = re_tags.replace_all(&decoded, " ");
    no_tags.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// RSS 2.0 wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    title: Option<String>,
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    // quick-xml strips namespace prefixes, so content:encoded and
    // media:content arrive under their local names.
    #[serde(rename = "encoded")]
    content_encoded: Option<String>,
    #[serde(rename = "content")]
    media_content: Vec<RssMediaContent>,
    enclosure: Option<RssEnclosure>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RssMediaContent {
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@medium")]
    medium: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RssEnclosure {
    #[serde(rename = "@url")]
    url: Option<String>,
}

impl Rss {
    fn into_parsed(self) -> ParsedFeed {
        let items = self
            .channel
            .items
            .into_iter()
            .map(|it| {
                let summary = it
                    .description
                    .as_deref()
                    .or(it.content_encoded.as_deref())
                    .map(strip_markup)
                    .filter(|s| !s.is_empty());
                RawFeedItem {
                    title: it.title,
                    pub_date: it.pub_date,
                    link: it.link,
                    content: it.content_encoded,
                    summary,
                    description: it.description,
                    media: it
                        .media_content
                        .into_iter()
                        .map(|m| MediaAttachment {
                            url: m.url,
                            medium: m.medium,
                        })
                        .collect(),
                    enclosure: it.enclosure.and_then(|e| e.url),
                }
            })
            .collect();
        ParsedFeed {
            title: self.channel.title,
            items,
        }
    }
}

// ---------------------------------------------------------------------------
// Atom wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AtomFeed {
    title: Option<String>,
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AtomEntry {
    title: Option<String>,
    #[serde(rename = "link")]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

impl AtomFeed {
    fn into_parsed(self) -> ParsedFeed {
        let items = self
            .entries
            .into_iter()
            .map(|e| {
                let link = e
                    .links
                    .iter()
                    .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                    .or_else(|| e.links.first())
                    .and_then(|l| l.href.clone());
                let summary = e
                    .summary
                    .as_deref()
                    .or(e.content.as_deref())
                    .map(strip_markup)
                    .filter(|s| !s.is_empty());
                RawFeedItem {
                    title: e.title,
                    pub_date: e.published.or(e.updated),
                    link,
                    content: e.content,
                    summary,
                    description: e.summary,
                    media: Vec::new(),
                    enclosure: None,
                }
            })
            .collect();
        ParsedFeed {
            title: self.title,
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_FIXTURE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Example Wire</title>
    <link>https://wire.example</link>
    <item>
      <title>First story</title>
      <link>https://wire.example/1</link>
      <pubDate>Sat, 31 Jan 2026 12:00:00 GMT</pubDate>
      <description>&lt;p&gt;Lead &amp;amp; summary&lt;/p&gt;</description>
      <content:encoded>&lt;p&gt;Body with &lt;img src="https://wire.example/inline.jpg"&gt;&lt;/p&gt;</content:encoded>
      <media:content url="https://wire.example/media.jpg" medium="image"/>
      <enclosure url="https://wire.example/enclosure.jpg" type="image/jpeg" length="1000"/>
    </item>
    <item>
      <title>Second story</title>
      <link>https://wire.example/2</link>
    </item>
  </channel>
</rss>"#;

    const ATOM_FIXTURE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <entry>
    <title>Atom entry</title>
    <link rel="alternate" href="https://atom.example/1"/>
    <published>2026-01-31T09:15:00Z</published>
    <summary>Plain summary</summary>
    <content type="html">&lt;p&gt;Rich &lt;img src="https://atom.example/pic.png"&gt;&lt;/p&gt;</content>
  </entry>
</feed>"#;

    #[test]
    fn rss_fixture_parses_with_all_media_encodings() {
        let feed = parse_feed(RSS_FIXTURE).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Example Wire"));
        assert_eq!(feed.items.len(), 2);

        let first = &feed.items[0];
        assert_eq!(first.title.as_deref(), Some("First story"));
        assert_eq!(first.media.len(), 1);
        assert_eq!(
            first.media[0].url.as_deref(),
            Some("https://wire.example/media.jpg")
        );
        assert_eq!(first.media[0].medium.as_deref(), Some("image"));
        assert_eq!(
            first.enclosure.as_deref(),
            Some("https://wire.example/enclosure.jpg")
        );
        assert!(first.content.as_deref().unwrap().contains("inline.jpg"));
        assert_eq!(first.summary.as_deref(), Some("Lead & summary"));

        let second = &feed.items[1];
        assert!(second.media.is_empty());
        assert!(second.enclosure.is_none());
        assert!(second.pub_date.is_none());
    }

    #[test]
    fn atom_fixture_parses_into_same_shape() {
        let feed = parse_feed(ATOM_FIXTURE).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Example Atom"));
        assert_eq!(feed.items.len(), 1);

        let entry = &feed.items[0];
        assert_eq!(entry.link.as_deref(), Some("https://atom.example/1"));
        assert_eq!(entry.pub_date.as_deref(), Some("2026-01-31T09:15:00Z"));
        assert_eq!(entry.summary.as_deref(), Some("Plain summary"));
        assert!(entry.content.as_deref().unwrap().contains("pic.png"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_feed("{\"not\": \"xml\"}").is_err());
    }

    #[test]
    fn timestamp_formats() {
        assert!(parse_timestamp("Sat, 31 Jan 2026 12:00:00 GMT").is_some());
        assert!(parse_timestamp("2026-01-31T09:15:00Z").is_some());
        assert!(parse_timestamp("2026-01-31 09:15:00").is_some());
        assert!(parse_timestamp("next Tuesday-ish").is_none());
    }

    #[test]
    fn mislabeled_weekday_still_parses_to_the_same_instant() {
        // 2026-01-31 is a Saturday; feeds ship the wrong label anyway.
        let mislabeled = parse_timestamp("Fri, 31 Jan 2026 12:00:00 GMT");
        let correct = parse_timestamp("Sat, 31 Jan 2026 12:00:00 GMT");
        assert!(mislabeled.is_some());
        assert_eq!(mislabeled, correct);

        let offset = parse_timestamp("Mon, 31 Jan 2026 13:00:00 +0100");
        assert_eq!(offset, correct);
    }

    #[test]
    fn strip_markup_flattens_to_one_line() {
        assert_eq!(
            strip_markup("<p>Hello,&nbsp;&nbsp;<b>world</b></p>\n"),
            "Hello, world"
        );
    }
}
