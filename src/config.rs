// src/config.rs
//
// Process configuration, read once from the environment at startup and
// passed explicitly into the router state. Pipelines never consult
// process globals after boot.

use std::env;

pub const DEFAULT_FEED_URL: &str = "https://news.google.com/rss";
pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Forces both pipelines to serve built-in mock data.
    pub mock_mode: bool,
    /// Ordered feed URL list; duplicates are kept as configured.
    pub feed_urls: Vec<String>,
    /// Home Assistant base URL. `None` forces the environment pipeline
    /// into mock mode regardless of `mock_mode`.
    pub hub_base_url: Option<String>,
    /// Long-lived bearer token attached to every hub call.
    pub hub_token: Option<String>,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mock_mode = env::var("MOCK_MODE")
            .map(|v| is_truthy(&v))
            .unwrap_or(false);

        let feed_urls = env::var("RSS_FEED_URLS")
            .ok()
            .map(|raw| parse_feed_urls(&raw))
            .filter(|urls| !urls.is_empty())
            .unwrap_or_else(|| vec![DEFAULT_FEED_URL.to_string()]);

        let hub_base_url = env::var("HA_BASE_URL")
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());

        let hub_token = env::var("HA_ACCESS_TOKEN")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            mock_mode,
            feed_urls,
            hub_base_url,
            hub_token,
            port,
        }
    }
}

/// Split a comma-separated feed list: trim each entry, drop empties,
/// keep order and duplicates exactly as configured.
pub fn parse_feed_urls(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_truthy(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
}
