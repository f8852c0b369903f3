//! WAQI feed payload parsing.

use chrono::Utc;
use serde_json::Value;

use crate::{WaqiError, WaqiResult};

/// Normalized readings for one station.
#[derive(Debug, Clone, PartialEq)]
pub struct StationFeed {
    /// Station slug as requested, e.g. "delhi/anand-vihar".
    pub station: String,
    /// Station display name reported by the feed.
    pub city_name: String,
    /// Observation time (ISO 8601), falling back to fetch time.
    pub timestamp: String,
    pub aqi: f64,
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub so2: f64,
    pub o3: f64,
    pub co: f64,
}

impl StationFeed {
    /// Last path segment of the station slug, used as a display fallback.
    pub fn slug_tail(&self) -> &str {
        self.station.rsplit('/').next().unwrap_or(&self.station)
    }
}

/// Parse a raw feed response body into a [`StationFeed`].
pub fn parse_feed(station: &str, body: &Value) -> WaqiResult<StationFeed> {
    let status = body
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or("missing");
    if status != "ok" {
        return Err(WaqiError::FeedNotOk(status.to_string()));
    }

    let data = body
        .get("data")
        .ok_or_else(|| WaqiError::Malformed("missing 'data' object".to_string()))?;

    let iaqi = data.get("iaqi");
    let pollutant = |key: &str| -> f64 {
        safe_float(
            iaqi.and_then(|m| m.get(key))
                .and_then(|entry| entry.get("v")),
        )
    };

    let timestamp = data
        .get("time")
        .and_then(|t| t.get("iso"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| Utc::now().to_rfc3339());

    let city_name = data
        .get("city")
        .and_then(|c| c.get("name"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();

    Ok(StationFeed {
        station: station.to_string(),
        city_name,
        timestamp,
        aqi: safe_float(data.get("aqi")),
        pm25: pollutant("pm25"),
        pm10: pollutant("pm10"),
        no2: pollutant("no2"),
        so2: pollutant("so2"),
        o3: pollutant("o3"),
        co: pollutant("co"),
    })
}

/// Coerce a feed value to f64.
///
/// The feed reports missing sensors as `null`, `"-"`, `""`, `"NA"`, or
/// `"N/A"`; all of those (and anything unparseable) become 0.0.
fn safe_float(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if matches!(trimmed, "" | "-" | "NA" | "N/A") {
                0.0
            } else {
                trimmed.parse().unwrap_or(0.0)
            }
        }
        _ => 0.0,
    }
}
