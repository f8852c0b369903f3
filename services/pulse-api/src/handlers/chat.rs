//! Policy chat endpoints (blocking, SSE streaming, RAG lifecycle).

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    http::{header, HeaderName},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Extension, Json,
};
use futures::stream::{self, Stream};
use metrics::counter;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;

use rag_engine::ChatEvent;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: String,
}

/// POST /api/chat - answer a policy question in one response
pub async fn chat(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    counter!("chat_requests_total").increment(1);

    let live = state.latest_snapshot().await;
    let (answer, sources) = state.rag.answer(request.question, live).await;

    Json(json!({ "answer": answer, "sources": sources }))
}

/// POST /api/chat/stream - answer a policy question token by token
///
/// Emits `{"token": ...}` events followed by one `{"done": true, "sources": [...]}`.
pub async fn chat_stream(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> impl IntoResponse {
    counter!("chat_stream_requests_total").increment(1);

    let live = state.latest_snapshot().await;
    let rx = state.rag.query_stream(request.question, live);

    (
        // Keep proxies from buffering the token stream
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(event_stream(rx)).keep_alive(KeepAlive::default()),
    )
}

/// GET /api/rag/status - RAG initialization progress
pub async fn rag_status(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(state.rag.status().await)
}

/// POST /api/rag/preload - kick off RAG initialization ahead of first use
pub async fn rag_preload(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    let triggered = state.rag.ensure_started();
    Json(json!({
        "status": if triggered { "loading_triggered" } else { "already_started" },
    }))
}

/// Adapt the engine's event channel to SSE frames.
fn event_stream(
    rx: mpsc::Receiver<ChatEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let payload = match event {
            ChatEvent::Token(token) => json!({ "token": token }),
            ChatEvent::Done { sources } => json!({ "done": true, "sources": sources }),
        };
        Some((Ok(Event::default().data(payload.to_string())), rx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rag_engine::SourceRef;

    #[test]
    fn test_chat_request_deserializes() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"question": "What is GRAP?"}"#).unwrap();
        assert_eq!(request.question, "What is GRAP?");
    }

    #[tokio::test]
    async fn test_event_stream_frames() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(ChatEvent::Token("Stage".to_string())).await.unwrap();
        tx.send(ChatEvent::Done {
            sources: vec![SourceRef {
                title: "Graded Response Action Plan".to_string(),
                id: "GRAP_2023".to_string(),
            }],
        })
        .await
        .unwrap();
        drop(tx);

        let frames: Vec<_> = event_stream(rx).collect().await;
        assert_eq!(frames.len(), 2);
    }
}
