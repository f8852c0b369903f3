//! Engine lifecycle and query orchestration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tracing::{info, warn};

use aqi_common::Snapshot;

use crate::embeddings::EmbeddingsClient;
use crate::index::{IndexedChunk, PolicyIndex, ScoredChunk};
use crate::llm::GeminiClient;
use crate::policies::POLICIES;
use crate::prompt;
use crate::splitter::{chunk_text, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};

/// Number of source documents retrieved per question.
const TOP_K: usize = 3;
/// How long a query waits for initialization before giving up.
const READY_TIMEOUT: Duration = Duration::from_secs(180);
/// Poll interval while waiting for initialization.
const READY_CHECK_INTERVAL: Duration = Duration::from_secs(1);
/// Interval between progress tokens while waiting.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);
/// Pacing delay between placeholder tokens.
const MOCK_TOKEN_DELAY: Duration = Duration::from_millis(12);

/// Initialization stage of the engine.
///
/// Initialization always terminates in `Ready`: failures along the way
/// degrade the engine (term retrieval, placeholder answers) and are
/// reported through [`RagStatus::error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitStage {
    Idle,
    Starting,
    InitializingEmbeddings,
    BuildingIndex,
    Ready,
}

impl InitStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitStage::Idle => "idle",
            InitStage::Starting => "starting",
            InitStage::InitializingEmbeddings => "initializing_embeddings",
            InitStage::BuildingIndex => "building_index",
            InitStage::Ready => "ready",
        }
    }

    fn progress_message(&self) -> &'static str {
        match self {
            InitStage::InitializingEmbeddings => "Initializing embeddings API...",
            InitStage::BuildingIndex => "Building vector index...",
            _ => "Initializing...",
        }
    }
}

/// Status report for the `/api/rag/status` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RagStatus {
    /// True once initialization has been triggered.
    pub loaded: bool,
    /// True once the index is built and queries are answerable.
    pub ready: bool,
    /// Current initialization stage.
    pub stage: String,
    /// True when running without embeddings (no API key or embed failure).
    pub degraded: bool,
    /// Why initialization degraded, when it failed rather than ran keyless.
    pub error: Option<String>,
}

/// Source attribution for a retrieved document.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub title: String,
    pub id: String,
}

/// One event in a streamed chat answer.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    Token(String),
    Done { sources: Vec<SourceRef> },
}

/// RAG engine with staged background initialization.
pub struct RagEngine {
    embeddings: Option<EmbeddingsClient>,
    llm: Option<GeminiClient>,
    stage: RwLock<InitStage>,
    index: RwLock<Option<Arc<PolicyIndex>>>,
    degraded: AtomicBool,
    init_error: RwLock<Option<String>>,
    init_started: AtomicBool,
}

impl RagEngine {
    /// Build an engine. `api_key` enables Gemini embeddings + generation;
    /// without it the engine runs in degraded placeholder mode.
    pub fn new(api_key: Option<String>) -> Self {
        let api_key = api_key.filter(|k| !k.is_empty() && k != "your_key_here");

        let (embeddings, llm) = match &api_key {
            Some(key) => (
                EmbeddingsClient::new(key.clone()).ok(),
                GeminiClient::new(key.clone()).ok(),
            ),
            None => (None, None),
        };

        Self {
            embeddings,
            llm,
            stage: RwLock::new(InitStage::Idle),
            index: RwLock::new(None),
            degraded: AtomicBool::new(false),
            init_error: RwLock::new(None),
            init_started: AtomicBool::new(false),
        }
    }

    /// Override the embeddings endpoint base URL (tests).
    pub fn with_embeddings_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.embeddings = self.embeddings.map(|e| e.with_base_url(base_url));
        self
    }

    /// Trigger background initialization once; later calls are no-ops.
    ///
    /// Returns true when this call started the init task.
    pub fn ensure_started(self: &Arc<Self>) -> bool {
        if self.init_started.swap(true, Ordering::SeqCst) {
            return false;
        }
        let engine = self.clone();
        tokio::spawn(async move {
            engine.initialize().await;
        });
        true
    }

    /// Run initialization: chunk the corpus, embed it when possible,
    /// and publish the index.
    async fn initialize(self: &Arc<Self>) {
        *self.stage.write().await = InitStage::Starting;
        info!(documents = POLICIES.len(), "Initializing RAG engine");

        let mut chunks: Vec<IndexedChunk> = Vec::new();
        for doc in &POLICIES {
            for piece in chunk_text(&doc.full_text(), DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP) {
                chunks.push(IndexedChunk {
                    doc_id: doc.id.to_string(),
                    title: doc.title.to_string(),
                    text: piece,
                    embedding: None,
                });
            }
        }

        if let Some(embedder) = &self.embeddings {
            *self.stage.write().await = InitStage::InitializingEmbeddings;
            let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

            match embedder.embed_documents(&texts).await {
                Ok(vectors) if vectors.len() == chunks.len() => {
                    for (chunk, vector) in chunks.iter_mut().zip(vectors) {
                        chunk.embedding = Some(vector);
                    }
                    info!(chunks = chunks.len(), "Embedded policy corpus");
                }
                Ok(vectors) => {
                    warn!(
                        expected = chunks.len(),
                        got = vectors.len(),
                        "Embedding count mismatch, falling back to term retrieval"
                    );
                    *self.init_error.write().await = Some(format!(
                        "embedding count mismatch: expected {}, got {}",
                        chunks.len(),
                        vectors.len()
                    ));
                    self.degraded.store(true, Ordering::SeqCst);
                }
                Err(e) => {
                    warn!(error = %e, "Embedding failed, falling back to term retrieval");
                    *self.init_error.write().await = Some(format!("embedding failed: {}", e));
                    self.degraded.store(true, Ordering::SeqCst);
                }
            }
        } else {
            info!("No LLM API key configured, running in placeholder mode");
            self.degraded.store(true, Ordering::SeqCst);
        }

        *self.stage.write().await = InitStage::BuildingIndex;
        let index = Arc::new(PolicyIndex::new(chunks));
        *self.index.write().await = Some(index);

        *self.stage.write().await = InitStage::Ready;
        info!(degraded = self.degraded.load(Ordering::SeqCst), "RAG engine ready");
    }

    pub async fn is_ready(&self) -> bool {
        *self.stage.read().await == InitStage::Ready
    }

    pub async fn status(&self) -> RagStatus {
        let stage = *self.stage.read().await;
        RagStatus {
            loaded: self.init_started.load(Ordering::SeqCst),
            ready: stage == InitStage::Ready,
            stage: stage.as_str().to_string(),
            degraded: self.degraded.load(Ordering::SeqCst),
            error: self.init_error.read().await.clone(),
        }
    }

    /// Retrieve source attributions for a question (empty until ready).
    pub async fn sources_for(&self, question: &str) -> Vec<SourceRef> {
        let Some(index) = self.index.read().await.clone() else {
            return Vec::new();
        };
        let query_vec = self.query_vector(question, &index).await;
        index
            .search_documents(question, query_vec.as_deref(), TOP_K)
            .iter()
            .map(|hit| SourceRef {
                title: hit.title.clone(),
                id: hit.doc_id.clone(),
            })
            .collect()
    }

    async fn query_vector(&self, question: &str, index: &PolicyIndex) -> Option<Vec<f32>> {
        if !index.has_embeddings() {
            return None;
        }
        let embedder = self.embeddings.as_ref()?;
        match embedder.embed_query(question).await {
            Ok(vec) => Some(vec),
            Err(e) => {
                warn!(error = %e, "Query embedding failed, using term retrieval");
                None
            }
        }
    }

    /// Stream an answer for `question` with `live` metrics as context.
    ///
    /// The returned channel yields tokens followed by a single
    /// [`ChatEvent::Done`] carrying the retrieved sources. Initialization is
    /// triggered if it has not run yet; queries wait for readiness with
    /// periodic progress tokens.
    pub fn query_stream(
        self: &Arc<Self>,
        question: String,
        live: Option<Snapshot>,
    ) -> mpsc::Receiver<ChatEvent> {
        self.ensure_started();

        let (tx, rx) = mpsc::channel(64);
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run_query(question, live, tx).await;
        });
        rx
    }

    /// Collect the full answer (used by the non-streaming chat endpoint).
    pub async fn answer(
        self: &Arc<Self>,
        question: String,
        live: Option<Snapshot>,
    ) -> (String, Vec<SourceRef>) {
        let mut rx = self.query_stream(question, live);
        let mut answer = String::new();
        let mut sources = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                ChatEvent::Token(token) => answer.push_str(&token),
                ChatEvent::Done { sources: s } => sources = s,
            }
        }
        (answer, sources)
    }

    async fn run_query(
        self: Arc<Self>,
        question: String,
        live: Option<Snapshot>,
        tx: mpsc::Sender<ChatEvent>,
    ) {
        if !self.wait_until_ready(&tx).await {
            let _ = tx.send(ChatEvent::Done { sources: vec![] }).await;
            return;
        }

        let index = match self.index.read().await.clone() {
            Some(index) => index,
            None => {
                let _ = tx
                    .send(ChatEvent::Token(
                        "Policy index unavailable, please retry shortly.\n".to_string(),
                    ))
                    .await;
                let _ = tx.send(ChatEvent::Done { sources: vec![] }).await;
                return;
            }
        };

        let query_vec = self.query_vector(&question, &index).await;
        let retrieved = index.search_documents(&question, query_vec.as_deref(), TOP_K);
        let sources: Vec<SourceRef> = retrieved
            .iter()
            .map(|hit| SourceRef {
                title: hit.title.clone(),
                id: hit.doc_id.clone(),
            })
            .collect();

        match &self.llm {
            Some(llm) => {
                let full_prompt = prompt::build_prompt(&question, live.as_ref(), &retrieved);
                if let Err(e) = llm.stream_generate(&full_prompt, &tx).await {
                    warn!(error = %e, "Generation failed, falling back to placeholder answer");
                    self.mock_stream(live.as_ref(), &retrieved, &tx).await;
                }
            }
            None => {
                self.mock_stream(live.as_ref(), &retrieved, &tx).await;
            }
        }

        let _ = tx.send(ChatEvent::Done { sources }).await;
    }

    /// Wait for the engine to become ready, emitting progress tokens.
    ///
    /// Returns false on timeout.
    async fn wait_until_ready(&self, tx: &mpsc::Sender<ChatEvent>) -> bool {
        let started = Instant::now();
        let mut last_progress: Option<Instant> = None;

        loop {
            let stage = *self.stage.read().await;
            if stage == InitStage::Ready {
                return true;
            }

            if started.elapsed() >= READY_TIMEOUT {
                let _ = tx
                    .send(ChatEvent::Token(format!(
                        "RAG initialization timed out after {}s.\n",
                        READY_TIMEOUT.as_secs()
                    )))
                    .await;
                return false;
            }

            let should_report = last_progress
                .map(|t| t.elapsed() >= PROGRESS_INTERVAL)
                .unwrap_or(started.elapsed() >= PROGRESS_INTERVAL);
            if should_report {
                let _ = tx
                    .send(ChatEvent::Token(format!(
                        "{} ({}s elapsed)\n",
                        stage.progress_message(),
                        started.elapsed().as_secs()
                    )))
                    .await;
                last_progress = Some(Instant::now());
            }

            tokio::time::sleep(READY_CHECK_INTERVAL).await;
        }
    }

    /// Deterministic placeholder answer built from live data and sources.
    async fn mock_stream(
        &self,
        live: Option<&Snapshot>,
        retrieved: &[ScoredChunk],
        tx: &mpsc::Sender<ChatEvent>,
    ) {
        let summary = live
            .map(|snap| {
                let mut lines: Vec<String> = snap
                    .cities
                    .iter()
                    .map(|(name, stats)| format!("{}: AQI {:.0}", name, stats.avg_aqi))
                    .collect();
                lines.sort();
                lines.join(" | ")
            })
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Fetching live data...".to_string());

        let total_co2 = live.map(|s| s.total_co2).unwrap_or(0.0);
        let sources = retrieved
            .iter()
            .map(|hit| hit.title.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let text = format!(
            "**Live City Status**\n{}\nTotal CO2: {:.1} kg/hr\n\n\
             **Retrieved Policies:** {}\n\n\
             **Recommended Actions (NCAP/GRAP):**\n\
             - Traffic signal synchronisation -> -20% idle emissions\n\
             - Industrial output reduction -> -25% in high-emission zones\n\
             - Public transport frequency +25% during peak hours\n\n\
             *(Set GOOGLE_API_KEY for full Gemini AI analysis)*",
            summary, total_co2, sources
        );

        for word in text.split_whitespace() {
            if tx
                .send(ChatEvent::Token(format!("{} ", word)))
                .await
                .is_err()
            {
                return;
            }
            tokio::time::sleep(MOCK_TOKEN_DELAY).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyless_engine() -> Arc<RagEngine> {
        Arc::new(RagEngine::new(None))
    }

    #[tokio::test]
    async fn test_engine_starts_idle() {
        let engine = keyless_engine();
        let status = engine.status().await;
        assert!(!status.loaded);
        assert!(!status.ready);
        assert_eq!(status.stage, "idle");
    }

    #[tokio::test]
    async fn test_ensure_started_is_idempotent() {
        let engine = keyless_engine();
        assert!(engine.ensure_started());
        assert!(!engine.ensure_started());
    }

    #[tokio::test]
    async fn test_keyless_init_reaches_degraded_ready() {
        let engine = keyless_engine();
        engine.ensure_started();

        // Keyless init is pure CPU work; give it a moment
        for _ in 0..50 {
            if engine.is_ready().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let status = engine.status().await;
        assert!(status.ready, "engine never became ready");
        assert!(status.degraded);
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn test_placeholder_answer_cites_sources() {
        let engine = keyless_engine();
        let (answer, sources) = engine
            .answer("What does GRAP require for diesel gensets?".to_string(), None)
            .await;

        assert!(answer.contains("Recommended Actions"));
        assert_eq!(sources.len(), 3);
        assert!(sources.iter().any(|s| s.id == "GRAP_2023"));
    }

    #[tokio::test]
    async fn test_sources_empty_before_init() {
        let engine = keyless_engine();
        let sources = engine.sources_for("anything").await;
        assert!(sources.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_recorded_and_degraded() {
        // Unroutable embeddings endpoint: init still terminates ready,
        // degraded, with the failure reason in the status report
        let engine = Arc::new(
            RagEngine::new(Some("test-key".to_string()))
                .with_embeddings_base_url("http://127.0.0.1:1"),
        );
        engine.ensure_started();

        for _ in 0..200 {
            if engine.is_ready().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        let status = engine.status().await;
        assert!(status.ready, "engine never became ready");
        assert!(status.degraded);
        let error = status.error.expect("failure reason missing");
        assert!(error.starts_with("embedding failed"));
    }

    #[tokio::test]
    async fn test_blank_api_key_treated_as_absent() {
        let engine = Arc::new(RagEngine::new(Some(String::new())));
        engine.ensure_started();
        for _ in 0..50 {
            if engine.is_ready().await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(engine.status().await.degraded);
    }
}
