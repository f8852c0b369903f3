//! Snapshot and city-selection endpoints.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse},
    Extension, Json,
};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use aqi_common::Snapshot;

use crate::state::AppState;

/// Dashboard page markup, resolved at startup.
pub struct DashboardHtml(pub String);

/// GET /app - the monitoring dashboard
pub async fn app_page(Extension(page): Extension<Arc<DashboardHtml>>) -> Html<String> {
    Html(page.0.clone())
}

/// GET /api/snapshot - latest aggregated readings
///
/// Serves an empty snapshot until the first poll cycle completes.
pub async fn snapshot(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    counter!("snapshot_requests_total").increment(1);

    let snapshot = state
        .latest_snapshot()
        .await
        .unwrap_or_else(Snapshot::empty);
    Json(snapshot)
}

/// GET /api/cities - the configured city roster
pub async fn cities(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let cities: Vec<_> = state
        .cities
        .cities
        .iter()
        .map(|c| {
            json!({
                "name": c.name,
                "stations": c.stations.len(),
                "color": c.color,
                "emoji": c.emoji,
            })
        })
        .collect();

    Json(json!({ "cities": cities }))
}

#[derive(Debug, Deserialize)]
pub struct SelectCitiesRequest {
    pub cities: Vec<String>,
}

/// POST /api/cities/select - restrict polling to a subset of cities
///
/// Unknown names are dropped. Deselecting everything leaves the active
/// set empty, so the poller fetches nothing until a new selection.
pub async fn select_cities(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<SelectCitiesRequest>,
) -> impl IntoResponse {
    let active: Vec<String> = request
        .cities
        .into_iter()
        .filter(|name| state.cities.get(name).is_some())
        .collect();

    info!(active = ?active, "Updated active city selection");
    *state.active_cities.write().await = active.clone();

    (
        StatusCode::OK,
        Json(json!({ "status": "ok", "active": active })),
    )
}
