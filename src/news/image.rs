// src/news/image.rs
//
// Image resolution for news items. Feeds encode a representative image in
// several incompatible ways; an ordered strategy chain is tried until one
// yields a URL. The final placeholder strategy cannot fail, so every item
// ends up with a non-empty image.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::news::feed::RawFeedItem;

/// Ordered extraction strategies; first `Some` wins.
const STRATEGIES: &[fn(&RawFeedItem) -> Option<String>] =
    &[from_media_attachments, from_enclosure, from_inline_markup];

/// Resolve an image URL for one item. Never returns an empty string.
pub fn resolve_image(item: &RawFeedItem) -> String {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy(item))
        .unwrap_or_else(|| placeholder_for(item.title.as_deref().unwrap_or_default()))
}

/// Deterministic placeholder, seeded by the item title so a given title
/// always renders the same picture while different titles diverge.
pub fn placeholder_for(title: &str) -> String {
    format!(
        "https://picsum.photos/seed/{}/800/600",
        urlencoding::encode(title)
    )
}

/// Strategy 1: structured media-attachment list. Entries with a declared
/// non-image medium are skipped; an unspecified medium counts as an image.
fn from_media_attachments(item: &RawFeedItem) -> Option<String> {
    item.media
        .iter()
        .filter(|m| matches!(m.medium.as_deref(), None | Some("image")))
        .find_map(|m| non_empty(m.url.as_deref()))
}

/// Strategy 2: single enclosure attachment.
fn from_enclosure(item: &RawFeedItem) -> Option<String> {
    non_empty(item.enclosure.as_deref())
}

/// Strategy 3: first `<img src="...">` in the first populated markup field,
/// checking full content, then the plain-text summary, then the raw
/// description.
fn from_inline_markup(item: &RawFeedItem) -> Option<String> {
    static RE_IMG: OnceCell<Regex> = OnceCell::new();
    let re = RE_IMG.get_or_init(|| Regex::new(r#"<img[^>]+src="([^">]+)""#).unwrap());

    let markup = non_empty(item.content.as_deref())
        .or_else(|| non_empty(item.summary.as_deref()))
        .or_else(|| non_empty(item.description.as_deref()))?;

    re.captures(&markup)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
