//! Hemma Dashboard — Binary Entrypoint
//! Boots the Axum HTTP server, wiring config, metrics, and both pipelines.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hemma_dashboard::api::{create_router, AppState};
use hemma_dashboard::config::AppConfig;
use hemma_dashboard::hub::client::{HubClient, ReqwestHubClient};
use hemma_dashboard::metrics::Metrics;
use hemma_dashboard::news::feed::HttpFeedFetcher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when the variables come from the
    // real environment.
    let _ = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();

    let config = AppConfig::from_env();
    tracing::info!(
        mock_mode = config.mock_mode,
        feeds = config.feed_urls.len(),
        port = config.port,
        "starting hemma-dashboard"
    );

    let metrics = Metrics::init();

    let hub = config.hub_base_url.as_ref().map(|base| {
        Arc::new(ReqwestHubClient::new(base.clone(), config.hub_token.clone()))
            as Arc<dyn HubClient>
    });
    if hub.is_none() {
        tracing::info!("HA_BASE_URL unset; /api/home-assistant serves built-in data");
    }

    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        feeds: Arc::new(HttpFeedFetcher::new()),
        hub,
    };
    let app = metrics.router().merge(create_router(state));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
