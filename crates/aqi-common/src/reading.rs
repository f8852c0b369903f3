//! Per-station reading types.

use serde::{Deserialize, Serialize};

/// One processed reading from a monitoring station.
///
/// Pollutant fields carry the WAQI individual-AQI values; missing sensor
/// readings are normalized to 0.0 by the feed client before this type is
/// constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationReading {
    /// Short zone identifier, e.g. "DE1" for the first Delhi station.
    pub zone_id: String,
    /// Display name from the feed, falling back to the station slug tail.
    pub zone_name: String,
    /// City this station belongs to.
    pub city: String,
    /// Observation timestamp (ISO 8601 from the feed, else poll time).
    pub timestamp: String,
    pub aqi: f64,
    pub pm25: f64,
    pub pm10: f64,
    pub no2: f64,
    pub so2: f64,
    pub o3: f64,
    pub co: f64,
    /// Estimated CO2 emission rate for the zone, kg/hr.
    pub co2_kg_hr: f64,
    /// True when the AQI spiked past the rolling-window threshold.
    pub anomaly: bool,
    /// Ratio of current AQI to the rolling mean (0.0 while warming up).
    pub anomaly_score: f64,
    pub data_source: String,
}

impl StationReading {
    /// Build the zone id for the `index`-th station of `city` (1-based).
    pub fn zone_id_for(city: &str, index: usize) -> String {
        let prefix: String = city.chars().take(2).collect::<String>().to_uppercase();
        format!("{}{}", prefix, index)
    }
}

/// Round to one decimal place.
pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Round to two decimal places.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
