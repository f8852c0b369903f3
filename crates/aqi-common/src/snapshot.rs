//! Poll-cycle snapshot aggregation.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::reading::{round1, round2, StationReading};

/// Display metadata for a city, carried into aggregates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityMeta {
    pub color: String,
    pub emoji: String,
}

impl Default for CityMeta {
    fn default() -> Self {
        Self {
            color: "#7fff00".to_string(),
            emoji: "\u{1F33F}".to_string(),
        }
    }
}

/// Per-city aggregate over one poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CityStats {
    pub total_co2: f64,
    pub avg_aqi: f64,
    pub avg_pm25: f64,
    pub count: usize,
    pub color: String,
    pub emoji: String,
}

/// The full state published after each successful poll cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: String,
    pub readings: Vec<StationReading>,
    pub total_co2: f64,
    pub avg_aqi: f64,
    pub cities: HashMap<String, CityStats>,
    pub data_source: String,
}

impl Snapshot {
    /// The response shape served before the first poll completes.
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            readings: Vec::new(),
            total_co2: 0.0,
            avg_aqi: 0.0,
            cities: HashMap::new(),
            data_source: "live".to_string(),
        }
    }

    /// Aggregate a batch of station readings into a snapshot.
    ///
    /// `city_meta` supplies the display color/emoji per city; unknown cities
    /// fall back to the defaults.
    pub fn aggregate(readings: Vec<StationReading>, city_meta: &HashMap<String, CityMeta>) -> Self {
        let total_co2 = round2(readings.iter().map(|r| r.co2_kg_hr).sum());
        let avg_aqi = if readings.is_empty() {
            0.0
        } else {
            round1(readings.iter().map(|r| r.aqi).sum::<f64>() / readings.len() as f64)
        };

        let mut cities: HashMap<String, CityStats> = HashMap::new();
        for reading in &readings {
            let meta = city_meta.get(&reading.city).cloned().unwrap_or_default();
            let entry = cities
                .entry(reading.city.clone())
                .or_insert_with(|| CityStats {
                    total_co2: 0.0,
                    avg_aqi: 0.0,
                    avg_pm25: 0.0,
                    count: 0,
                    color: meta.color,
                    emoji: meta.emoji,
                });
            // Accumulate sums first; means are finalized below
            entry.total_co2 += reading.co2_kg_hr;
            entry.avg_aqi += reading.aqi;
            entry.avg_pm25 += reading.pm25;
            entry.count += 1;
        }

        for stats in cities.values_mut() {
            let n = stats.count as f64;
            stats.total_co2 = round2(stats.total_co2);
            stats.avg_aqi = round1(stats.avg_aqi / n);
            stats.avg_pm25 = round1(stats.avg_pm25 / n);
        }

        Self {
            timestamp: Utc::now().to_rfc3339(),
            readings,
            total_co2,
            avg_aqi,
            cities,
            data_source: "live".to_string(),
        }
    }

    /// Readings ordered by CO2 emission rate, highest first.
    pub fn top_emitters(&self, limit: usize) -> Vec<&StationReading> {
        let mut sorted: Vec<&StationReading> = self.readings.iter().collect();
        sorted.sort_by(|a, b| {
            b.co2_kg_hr
                .partial_cmp(&a.co2_kg_hr)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(limit);
        sorted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(city: &str, zone: &str, aqi: f64, pm25: f64, co2: f64) -> StationReading {
        StationReading {
            zone_id: zone.to_string(),
            zone_name: zone.to_string(),
            city: city.to_string(),
            timestamp: "2024-01-15T12:00:00Z".to_string(),
            aqi,
            pm25,
            pm10: 0.0,
            no2: 0.0,
            so2: 0.0,
            o3: 0.0,
            co: 0.0,
            co2_kg_hr: co2,
            anomaly: false,
            anomaly_score: 0.0,
            data_source: "live".to_string(),
        }
    }

    #[test]
    fn test_empty_snapshot_shape() {
        let snap = Snapshot::empty();
        assert!(snap.readings.is_empty());
        assert!(snap.cities.is_empty());
        assert_eq!(snap.avg_aqi, 0.0);
    }

    #[test]
    fn test_aggregate_city_stats() {
        let readings = vec![
            reading("Delhi", "DE1", 300.0, 250.0, 10.0),
            reading("Delhi", "DE2", 200.0, 150.0, 8.0),
            reading("Mumbai", "MU1", 100.0, 60.0, 6.0),
        ];
        let meta = HashMap::from([(
            "Delhi".to_string(),
            CityMeta {
                color: "#7fff00".to_string(),
                emoji: "D".to_string(),
            },
        )]);

        let snap = Snapshot::aggregate(readings, &meta);

        assert_eq!(snap.total_co2, 24.0);
        assert_eq!(snap.avg_aqi, 200.0);
        assert_eq!(snap.cities.len(), 2);

        let delhi = &snap.cities["Delhi"];
        assert_eq!(delhi.count, 2);
        assert_eq!(delhi.avg_aqi, 250.0);
        assert_eq!(delhi.avg_pm25, 200.0);
        assert_eq!(delhi.total_co2, 18.0);
        assert_eq!(delhi.emoji, "D");

        // Unknown city falls back to default meta
        assert_eq!(snap.cities["Mumbai"].color, "#7fff00");
    }

    #[test]
    fn test_top_emitters_ordering() {
        let readings = vec![
            reading("Delhi", "DE1", 300.0, 250.0, 5.0),
            reading("Delhi", "DE2", 200.0, 150.0, 12.0),
            reading("Mumbai", "MU1", 100.0, 60.0, 9.0),
        ];
        let snap = Snapshot::aggregate(readings, &HashMap::new());

        let top = snap.top_emitters(2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].zone_id, "DE2");
        assert_eq!(top[1].zone_id, "MU1");
    }

    #[test]
    fn test_snapshot_serialization() {
        let snap = Snapshot::aggregate(
            vec![reading("Delhi", "DE1", 250.0, 180.0, 11.5)],
            &HashMap::new(),
        );
        let json = serde_json::to_string(&snap).unwrap();
        assert!(json.contains("\"total_co2\":11.5"));
        assert!(json.contains("\"data_source\":\"live\""));
    }
}
