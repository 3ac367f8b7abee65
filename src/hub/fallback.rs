// src/hub/fallback.rs
//
// Built-in substitute payloads for the environment snapshot. Loaded once,
// immutable for the process lifetime; served whenever the hub is
// unconfigured, unreachable, or returns nothing usable.

use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use crate::hub::{Entity, EnvironmentResponse};

static WEATHER: Lazy<Entity> = Lazy::new(|| Entity {
    state: json!("partlycloudy"),
    attributes: attrs(json!({
        "temperature": 22,
        "forecast": forecast_list(),
    })),
});

static ENERGY: Lazy<Entity> = Lazy::new(|| Entity {
    // Current price in cents.
    state: json!(15.4),
    attributes: attrs(json!({
        "raw_today": hourly_prices(),
        "raw_tomorrow": [],
    })),
});

static SUN: Lazy<Entity> = Lazy::new(|| Entity {
    state: Value::Null,
    attributes: attrs(json!({
        "next_rising": "2026-02-01T06:30:00",
        "next_setting": "2026-01-31T18:45:00",
    })),
});

pub fn weather() -> Entity {
    WEATHER.clone()
}

pub fn energy() -> Entity {
    ENERGY.clone()
}

pub fn sun() -> Entity {
    SUN.clone()
}

/// The complete fallback triple, served verbatim in mock mode.
pub fn snapshot() -> EnvironmentResponse {
    EnvironmentResponse {
        weather: weather(),
        energy: energy(),
        sun: sun(),
    }
}

/// Fallback hourly forecast, inserted when no live forecast could be found
/// and the weather entity carries none of its own.
pub fn forecast() -> Vec<Value> {
    forecast_list()
        .as_array()
        .cloned()
        .unwrap_or_default()
}

fn forecast_list() -> Value {
    json!([
        { "datetime": "2026-02-01T12:00:00", "temperature": 21, "condition": "sunny" },
        { "datetime": "2026-02-02T12:00:00", "temperature": 20, "condition": "partlycloudy" },
        { "datetime": "2026-02-03T12:00:00", "temperature": 19, "condition": "rainy" },
    ])
}

/// Synthetic 24-slot price curve: cheap at night, peaking in the evening.
/// Deterministic so repeated requests serve identical data.
fn hourly_prices() -> Value {
    let slots: Vec<Value> = (0..24)
        .map(|h| {
            let phase = (h as f64 - 4.0) * std::f64::consts::PI / 12.0;
            let value = ((12.0 + 9.0 * phase.sin()) * 100.0).round() / 100.0;
            json!({ "start": format!("2026-01-31T{h:02}:00:00"), "value": value })
        })
        .collect();
    Value::Array(slots)
}

fn attrs(v: Value) -> Map<String, Value> {
    match v {
        Value::Object(m) => m,
        _ => Map::new(),
    }
}
