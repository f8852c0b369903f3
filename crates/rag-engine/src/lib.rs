//! Retrieval-augmented generation over the Indian climate-policy corpus.
//!
//! The engine embeds a fixed set of policy documents into an in-memory
//! vector index at startup (Gemini `text-embedding-004`), retrieves the
//! top-k snippets for a question, stuffs them together with live air-quality
//! metrics into a prompt, and streams the answer from Gemini. Without an API
//! key the engine degrades: retrieval falls back to term overlap and answers
//! come from a deterministic placeholder generator.

pub mod embeddings;
pub mod engine;
pub mod index;
pub mod llm;
pub mod policies;
pub mod prompt;
pub mod splitter;

use thiserror::Error;

pub use embeddings::EmbeddingsClient;
pub use engine::{ChatEvent, InitStage, RagEngine, RagStatus, SourceRef};
pub use index::{PolicyIndex, ScoredChunk};
pub use llm::GeminiClient;
pub use policies::{PolicyDoc, POLICIES};

/// Result type alias using RagError.
pub type RagResult<T> = Result<T, RagError>;

/// Errors from the RAG pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Embedding API returned HTTP {status}: {message}")]
    EmbeddingApi { status: u16, message: String },

    #[error("LLM API returned HTTP {status}: {message}")]
    LlmApi { status: u16, message: String },

    #[error("Malformed API response: {0}")]
    Malformed(String),
}
