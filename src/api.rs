// src/api.rs
//
// HTTP boundary: router, shared state, and the error-to-JSON mapping.
// The handlers are thin; all interesting behavior lives in the pipelines.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{error, info};

use crate::config::AppConfig;
use crate::hub::{self, client::HubClient};
use crate::news::{self, feed::FeedFetcher};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub feeds: Arc<dyn FeedFetcher>,
    /// `None` when no hub base URL is configured; the environment endpoint
    /// then serves the built-in snapshot unconditionally.
    pub hub: Option<Arc<dyn HubClient>>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/news", get(get_news))
        .route("/api/home-assistant", get(get_home_assistant))
        // Static dashboard assets; the UI itself lives outside this crate.
        .fallback_service(ServeDir::new("public"))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Request-level failure rendered as `{"error", "details"?}` JSON.
struct ApiError {
    error: &'static str,
    details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.details {
            Some(details) => json!({ "error": self.error, "details": details }),
            None => json!({ "error": self.error }),
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

async fn get_news(
    State(state): State<AppState>,
) -> Result<Json<news::NewsResponse>, ApiError> {
    if state.config.mock_mode {
        info!("serving mock news data");
        return Ok(Json(news::mock_response()));
    }

    match news::aggregate(state.feeds.as_ref(), &state.config.feed_urls).await {
        Ok(resp) => Ok(Json(resp)),
        Err(e) => {
            error!(error = ?e, "news aggregation failed");
            Err(ApiError {
                error: "Failed to fetch news",
                details: Some(e.to_string()),
            })
        }
    }
}

/// Never fails on upstream trouble: every hole in the snapshot is filled
/// from the fallback tables inside the pipeline.
async fn get_home_assistant(State(state): State<AppState>) -> Json<hub::EnvironmentResponse> {
    match (&state.hub, state.config.mock_mode) {
        (Some(hub_client), false) => Json(hub::snapshot(hub_client.as_ref()).await),
        _ => {
            info!("serving built-in environment snapshot");
            Json(hub::fallback_snapshot())
        }
    }
}
