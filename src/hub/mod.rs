// src/hub/mod.rs
//
// Environment snapshot pipeline: a fixed 4-call fan-out against the hub
// (weather, energy price, sun position, hourly forecast), per-call failure
// isolation, and fallback substitution so the response is always fully
// populated. Upstream failure is never a client-visible error here.

pub mod client;
pub mod fallback;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::hub::client::HubClient;

pub const WEATHER_ENTITY: &str = "weather.smhi_home";
pub const ENERGY_ENTITY: &str = "sensor.nordpool";
pub const SUN_ENTITY: &str = "sun.sun";

/// One hub entity: a scalar state plus an open attribute bag. Extra fields
/// the hub sends (entity_id, last_changed, ...) are dropped on decode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub state: Value,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    /// A decoded body with neither a state nor attributes carries no
    /// usable data and is treated the same as a failed call.
    fn is_usable(&self) -> bool {
        !self.state.is_null() || !self.attributes.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct EnvironmentResponse {
    pub weather: Entity,
    pub energy: Entity,
    pub sun: Entity,
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("hub_call_errors_total", "Hub calls that failed or decoded to nothing.");
        describe_counter!(
            "hub_fallbacks_total",
            "Entities substituted from the built-in fallback tables."
        );
    });
}

/// Fetch the three entities and the hourly forecast concurrently, waiting
/// for all four to settle, then fill every hole from the fallback tables.
pub async fn snapshot(client: &dyn HubClient) -> EnvironmentResponse {
    ensure_metrics_described();

    let (weather, energy, sun, forecast) = tokio::join!(
        fetch_entity(client, WEATHER_ENTITY),
        fetch_entity(client, ENERGY_ENTITY),
        fetch_entity(client, SUN_ENTITY),
        fetch_forecast(client),
    );

    let mut weather = weather.unwrap_or_else(|| substitute(WEATHER_ENTITY, fallback::weather()));
    let energy = energy.unwrap_or_else(|| substitute(ENERGY_ENTITY, fallback::energy()));
    let sun = sun.unwrap_or_else(|| substitute(SUN_ENTITY, fallback::sun()));

    apply_forecast(&mut weather, forecast);

    EnvironmentResponse {
        weather,
        energy,
        sun,
    }
}

/// The complete fallback triple, served when mock mode is active or no hub
/// is configured.
pub fn fallback_snapshot() -> EnvironmentResponse {
    fallback::snapshot()
}

fn substitute(entity_id: &str, entity: Entity) -> Entity {
    counter!("hub_fallbacks_total").increment(1);
    warn!(entity = entity_id, "substituting built-in fallback entity");
    entity
}

async fn fetch_entity(client: &dyn HubClient, entity_id: &str) -> Option<Entity> {
    let body = match client.get_state(entity_id).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = ?e, entity = entity_id, "hub state call failed");
            counter!("hub_call_errors_total").increment(1);
            return None;
        }
    };
    match serde_json::from_value::<Entity>(body) {
        Ok(entity) if entity.is_usable() => Some(entity),
        Ok(_) => {
            warn!(entity = entity_id, "hub returned an empty state object");
            counter!("hub_call_errors_total").increment(1);
            None
        }
        Err(e) => {
            warn!(error = ?e, entity = entity_id, "hub returned an unexpected shape");
            counter!("hub_call_errors_total").increment(1);
            None
        }
    }
}

async fn fetch_forecast(client: &dyn HubClient) -> Option<Vec<Value>> {
    match client.get_hourly_forecast(WEATHER_ENTITY).await {
        Ok(body) => extract_forecast(&body, WEATHER_ENTITY),
        Err(e) => {
            warn!(error = ?e, "hourly forecast call failed");
            counter!("hub_call_errors_total").increment(1);
            None
        }
    }
}

/// Ordered probes for the forecast list; the hub has shipped both shapes.
const FORECAST_PATHS: &[fn(&Value, &str) -> Option<Vec<Value>>] =
    &[forecast_at_top_level, forecast_under_service_response];

/// Locate the forecast list in a service-call response body, probing the
/// known shapes in order; first match wins.
pub fn extract_forecast(body: &Value, entity_id: &str) -> Option<Vec<Value>> {
    FORECAST_PATHS.iter().find_map(|probe| probe(body, entity_id))
}

fn forecast_at_top_level(body: &Value, entity_id: &str) -> Option<Vec<Value>> {
    body.get(entity_id)?.get("forecast")?.as_array().cloned()
}

fn forecast_under_service_response(body: &Value, entity_id: &str) -> Option<Vec<Value>> {
    forecast_at_top_level(body.get("service_response")?, entity_id)
}

/// A freshly fetched forecast always overrides `attributes.forecast`.
/// Without one, the weather entity must still never lack a forecast.
fn apply_forecast(weather: &mut Entity, forecast: Option<Vec<Value>>) {
    match forecast {
        Some(list) => {
            weather
                .attributes
                .insert("forecast".to_string(), Value::Array(list));
        }
        None => {
            if !weather.attributes.contains_key("forecast") {
                weather
                    .attributes
                    .insert("forecast".to_string(), Value::Array(fallback::forecast()));
            }
        }
    }
}
