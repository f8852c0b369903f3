//! Background polling and aggregation task.
//!
//! One tokio task owns the per-station rolling windows (single writer).
//! Each tick it fetches every station of the active cities, scores each
//! reading against its window, aggregates a snapshot, and publishes it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, Timelike};
use futures::stream::{self, StreamExt};
use metrics::{counter, gauge};
use tokio::sync::broadcast;
use tracing::{info, warn};

use aqi_common::{
    estimate_co2_kg_hr, AnomalyDetector, RollingWindow, Snapshot, StationReading,
};
use waqi_client::{StationFeed, WaqiClient, WaqiResult};

use crate::state::AppState;

/// Concurrent station fetches per poll cycle.
const FETCH_CONCURRENCY: usize = 8;

/// Periodic WAQI poller.
pub struct Poller {
    state: Arc<AppState>,
    client: WaqiClient,
    interval: Duration,
    windows: HashMap<String, RollingWindow>,
    detector: AnomalyDetector,
}

impl Poller {
    pub fn new(state: Arc<AppState>, client: WaqiClient, interval: Duration) -> Self {
        Self {
            state,
            client,
            interval,
            windows: HashMap::new(),
            detector: AnomalyDetector::default(),
        }
    }

    /// Poll until the shutdown signal fires.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        info!(interval_secs = self.interval.as_secs(), "Starting AQI poller");

        loop {
            self.poll_cycle().await;

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down poller");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Run one fetch/aggregate/publish cycle.
    pub async fn poll_cycle(&mut self) {
        counter!("poll_cycles_total").increment(1);

        let active = self.state.active_cities.read().await.clone();
        let feeds = self.fetch_all(&active).await;
        gauge!("stations_reporting").set(feeds.len() as f64);

        if feeds.is_empty() {
            // Keep the previous snapshot; stale beats empty
            warn!("Poll cycle produced no readings, keeping previous snapshot");
            return;
        }

        let local_hour = Local::now().hour();
        let readings: Vec<StationReading> = feeds
            .into_iter()
            .map(|(city, index, feed)| self.process_feed(&city, index, feed, local_hour))
            .collect();

        let anomalies = readings.iter().filter(|r| r.anomaly).count();
        if anomalies > 0 {
            counter!("anomalies_detected_total").increment(anomalies as u64);
        }

        info!(
            readings = readings.len(),
            anomalies = anomalies,
            "Poll cycle complete"
        );

        let snapshot = Snapshot::aggregate(readings, &self.state.cities.meta_map());
        self.state.publish(snapshot).await;
    }

    /// Fetch all stations of the given cities with bounded concurrency.
    ///
    /// Failed stations are dropped for this tick (their entries stay stale).
    async fn fetch_all(&self, cities: &[String]) -> Vec<(String, usize, StationFeed)> {
        let mut jobs = Vec::new();
        for name in cities {
            let Some(city) = self.state.cities.get(name) else {
                continue;
            };
            for (index, station) in city.stations.iter().enumerate() {
                jobs.push((city.name.clone(), index, station.clone()));
            }
        }

        let client = self.client.clone();
        let results: Vec<(String, usize, String, WaqiResult<StationFeed>)> = stream::iter(jobs)
            .map(|(city, index, station)| {
                let client = client.clone();
                async move {
                    let result = client.fetch_station(&station).await;
                    (city, index, station, result)
                }
            })
            .buffer_unordered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut feeds = Vec::new();
        for (city, index, station, result) in results {
            match result {
                Ok(feed) => feeds.push((city, index, feed)),
                Err(e) => {
                    counter!("poll_station_errors_total").increment(1);
                    warn!(station = %station, error = %e, "Station fetch failed");
                }
            }
        }
        feeds
    }

    /// Turn one feed into a reading, updating the station's window.
    fn process_feed(
        &mut self,
        city: &str,
        index: usize,
        feed: StationFeed,
        local_hour: u32,
    ) -> StationReading {
        let window = self
            .windows
            .entry(feed.station.clone())
            .or_default();

        // Score against the trailing window, then absorb the new sample
        let verdict = self.detector.score(feed.aqi, window);
        window.push(feed.aqi);

        let zone_name = if feed.city_name.is_empty() {
            feed.slug_tail().to_string()
        } else {
            feed.city_name.clone()
        };

        StationReading {
            zone_id: StationReading::zone_id_for(city, index + 1),
            zone_name,
            city: city.to_string(),
            timestamp: feed.timestamp,
            aqi: feed.aqi,
            pm25: feed.pm25,
            pm10: feed.pm10,
            no2: feed.no2,
            so2: feed.so2,
            o3: feed.o3,
            co: feed.co,
            co2_kg_hr: estimate_co2_kg_hr(feed.aqi, local_hour),
            anomaly: verdict.flagged,
            anomaly_score: verdict.score,
            data_source: "live".to_string(),
        }
    }
}
