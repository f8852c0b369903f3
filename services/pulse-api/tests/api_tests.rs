//! Tests for the pulse-api HTTP server components.
//!
//! These tests exercise the shared state, city selection flow, and the
//! wire formats served by the handlers without touching the network.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{Extension, Json};

use aqi_common::{Snapshot, StationReading};
use pulse_api::config::CitiesConfig;
use pulse_api::handlers::api::{select_cities, SelectCitiesRequest};
use pulse_api::state::AppState;

fn reading(city: &str, zone: &str, aqi: f64, co2: f64) -> StationReading {
    StationReading {
        zone_id: zone.to_string(),
        zone_name: zone.to_string(),
        city: city.to_string(),
        timestamp: "2024-01-15T12:00:00Z".to_string(),
        aqi,
        pm25: aqi,
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

fn state() -> Arc<AppState> {
    Arc::new(AppState::new(CitiesConfig::builtin(), None))
}

// ============================================================================
// Snapshot wire format
// ============================================================================

#[tokio::test]
async fn test_snapshot_before_first_poll_is_empty_shape() {
    let state = state();
    assert!(state.latest_snapshot().await.is_none());

    // Handlers substitute the empty snapshot; verify its shape
    let empty = Snapshot::empty();
    let json = serde_json::to_value(&empty).unwrap();
    assert_eq!(json["readings"], serde_json::json!([]));
    assert_eq!(json["avg_aqi"], 0.0);
    assert!(json["cities"].as_object().unwrap().is_empty());
}

#[tokio::test]
async fn test_published_snapshot_served_and_broadcast() {
    let state = state();
    let mut rx = state.updates.subscribe();

    let snapshot = Snapshot::aggregate(
        vec![
            reading("Delhi", "DE1", 280.0, 10.5),
            reading("Mumbai", "MU1", 90.0, 4.0),
        ],
        &state.cities.meta_map(),
    );
    state.publish(snapshot).await;

    let served = state.latest_snapshot().await.unwrap();
    assert_eq!(served.readings.len(), 2);
    assert_eq!(served.cities["Delhi"].count, 1);
    assert_eq!(served.cities["Mumbai"].color, "#38bdf8");

    let message = rx.recv().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&message).unwrap();
    assert_eq!(value["type"], "update");
    assert_eq!(value["data"]["readings"][0]["zone_id"], "DE1");
    assert_eq!(value["data"]["total_co2"], 14.5);
}

// ============================================================================
// City selection flow
// ============================================================================

#[tokio::test]
async fn test_city_selection_filters_unknown_names() {
    let state = state();

    let _ = select_cities(
        Extension(state.clone()),
        Json(SelectCitiesRequest {
            cities: vec!["Delhi".to_string(), "Atlantis".to_string()],
        }),
    )
    .await;

    assert_eq!(*state.active_cities.read().await, vec!["Delhi"]);
}

#[tokio::test]
async fn test_empty_selection_polls_nothing() {
    let state = state();
    assert_eq!(state.active_cities.read().await.len(), 5);

    let _ = select_cities(
        Extension(state.clone()),
        Json(SelectCitiesRequest { cities: vec![] }),
    )
    .await;

    assert!(state.active_cities.read().await.is_empty());
}

#[tokio::test]
async fn test_unknown_only_selection_ends_empty() {
    let state = state();

    let _ = select_cities(
        Extension(state.clone()),
        Json(SelectCitiesRequest {
            cities: vec!["Atlantis".to_string(), "Gotham".to_string()],
        }),
    )
    .await;

    assert!(state.active_cities.read().await.is_empty());
}

#[tokio::test]
async fn test_cities_listing_shape() {
    let state = state();
    let listing: Vec<serde_json::Value> = state
        .cities
        .cities
        .iter()
        .map(|c| {
            serde_json::json!({
                "name": c.name,
                "stations": c.stations.len(),
                "color": c.color,
                "emoji": c.emoji,
            })
        })
        .collect();

    assert_eq!(listing.len(), 5);
    assert_eq!(listing[0]["name"], "Delhi");
    assert_eq!(listing[0]["stations"], 4);
    assert_eq!(listing[4]["stations"], 2);
}

// ============================================================================
// Chat wire formats
// ============================================================================

#[test]
fn test_chat_response_serialization() {
    let response = serde_json::json!({
        "answer": "GRAP Stage III restricts construction activity.",
        "sources": [
            { "title": "Graded Response Action Plan (GRAP) - Revised 2023", "id": "GRAP_2023" }
        ]
    });

    let json = serde_json::to_string(&response).unwrap();
    assert!(json.contains("\"answer\":"));
    assert!(json.contains("\"id\":\"GRAP_2023\""));
}

#[tokio::test]
async fn test_rag_status_without_key_reports_degraded() {
    let state = state();
    state.rag.ensure_started();

    // No API key: initialization is quick and lands in degraded-ready
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !state.rag.is_ready().await && std::time::Instant::now() < deadline {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    let status = state.rag.status().await;
    assert!(status.ready);
    assert!(status.degraded);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["stage"], "ready");
}

// ============================================================================
// Aggregation consistency
// ============================================================================

#[test]
fn test_aggregate_matches_meta_roster() {
    let config = CitiesConfig::builtin();
    let meta = config.meta_map();

    let snapshot = Snapshot::aggregate(
        vec![
            reading("Kolkata", "KO1", 150.0, 7.0),
            reading("Kolkata", "KO2", 170.0, 8.0),
        ],
        &meta,
    );

    let kolkata = &snapshot.cities["Kolkata"];
    assert_eq!(kolkata.count, 2);
    assert_eq!(kolkata.avg_aqi, 160.0);
    assert_eq!(kolkata.color, "#f5a623");
    assert_eq!(snapshot.total_co2, 15.0);
}

#[test]
fn test_unknown_city_gets_default_meta() {
    let snapshot = Snapshot::aggregate(
        vec![reading("Pune", "PU1", 120.0, 5.0)],
        &HashMap::new(),
    );
    assert_eq!(snapshot.cities["Pune"].color, "#7fff00");
}
