//! Application state and shared resources.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use aqi_common::Snapshot;
use rag_engine::RagEngine;

use crate::config::CitiesConfig;

/// Broadcast buffer for snapshot updates. Slow WebSocket consumers that
/// fall behind skip to the newest message.
const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Shared application state.
///
/// The poller is the single writer of `latest`; request handlers and the
/// WebSocket fan-out only read. Last write wins.
pub struct AppState {
    /// Configured city roster (immutable after startup).
    pub cities: CitiesConfig,
    /// Cities currently being polled.
    pub active_cities: RwLock<Vec<String>>,
    /// Most recent successful snapshot.
    pub latest: RwLock<Option<Snapshot>>,
    /// Pre-serialized update messages for WebSocket fan-out.
    pub updates: broadcast::Sender<String>,
    /// RAG engine for the chat endpoints.
    pub rag: Arc<RagEngine>,
}

impl AppState {
    pub fn new(cities: CitiesConfig, google_api_key: Option<String>) -> Self {
        let active_cities = cities.names();
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        Self {
            cities,
            active_cities: RwLock::new(active_cities),
            latest: RwLock::new(None),
            updates,
            rag: Arc::new(RagEngine::new(google_api_key)),
        }
    }

    /// Store a new snapshot and fan it out to WebSocket subscribers.
    pub async fn publish(&self, snapshot: Snapshot) {
        let payload = Self::update_message(&snapshot);
        *self.latest.write().await = Some(snapshot);

        // Err means no subscribers, which is fine
        if let Err(e) = self.updates.send(payload) {
            debug!(error = %e, "No WebSocket subscribers for update");
        }
    }

    pub async fn latest_snapshot(&self) -> Option<Snapshot> {
        self.latest.read().await.clone()
    }

    /// Wire format for one pushed update.
    pub fn update_message(snapshot: &Snapshot) -> String {
        json!({ "type": "update", "data": snapshot }).to_string()
    }
}
