// src/hub/client.rs
//
// Home Assistant REST client. The pipeline consumes the HubClient trait so
// tests can swap in fakes; this is the only place that knows the hub's
// URL scheme and auth header.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Hub call capability consumed by the environment pipeline.
#[async_trait]
pub trait HubClient: Send + Sync {
    /// GET the current state object of one entity.
    async fn get_state(&self, entity_id: &str) -> Result<Value>;
    /// POST the hourly-forecast service call for one weather entity,
    /// requesting a synchronous service response.
    async fn get_hourly_forecast(&self, entity_id: &str) -> Result<Value>;
}

pub struct ReqwestHubClient {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl ReqwestHubClient {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl HubClient for ReqwestHubClient {
    async fn get_state(&self, entity_id: &str) -> Result<Value> {
        let url = format!("{}/api/states/{entity_id}", self.base_url);
        let resp = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .with_context(|| format!("requesting hub state {entity_id}"))?
            .error_for_status()
            .with_context(|| format!("hub state {entity_id} returned an error status"))?;
        resp.json::<Value>()
            .await
            .with_context(|| format!("decoding hub state {entity_id}"))
    }

    async fn get_hourly_forecast(&self, entity_id: &str) -> Result<Value> {
        let url = format!(
            "{}/api/services/weather/get_forecasts?return_response",
            self.base_url
        );
        let resp = self
            .authorize(self.client.post(&url))
            .json(&json!({ "entity_id": entity_id, "type": "hourly" }))
            .send()
            .await
            .context("requesting hourly forecast")?
            .error_for_status()
            .context("hourly forecast call returned an error status")?;
        resp.json::<Value>()
            .await
            .context("decoding hourly forecast response")
    }
}
