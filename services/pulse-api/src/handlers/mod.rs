//! HTTP endpoint handlers.

pub mod api;
pub mod chat;
pub mod ws;

use std::sync::Arc;

use axum::{response::IntoResponse, Extension, Json};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;

use crate::state::AppState;

/// GET / - service identity and the monitored city roster
pub async fn root(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "service": "greenpulse",
        "status": "live",
        "cities": state.cities.names(),
    }))
}

/// GET /health - liveness probe
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "pulse-api",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /metrics - Prometheus exposition
pub async fn metrics(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}
