//! In-memory vector index over policy document chunks.

use serde::Serialize;
use tracing::debug;

/// One chunk stored in the index.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    /// Document id the chunk came from (e.g. "GRAP_2023").
    pub doc_id: String,
    /// Document title for prompt context and source attribution.
    pub title: String,
    /// Chunk body text.
    pub text: String,
    /// Embedding vector; `None` when the engine runs without an API key.
    pub embedding: Option<Vec<f32>>,
}

/// A retrieval hit.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredChunk {
    pub doc_id: String,
    pub title: String,
    pub text: String,
    pub score: f32,
}

/// Similarity index over the chunked policy corpus.
///
/// Searches by cosine similarity when both the query and the chunks carry
/// embeddings; otherwise falls back to case-insensitive term overlap so
/// retrieval keeps working without an embedding provider.
#[derive(Debug, Default)]
pub struct PolicyIndex {
    chunks: Vec<IndexedChunk>,
}

impl PolicyIndex {
    pub fn new(chunks: Vec<IndexedChunk>) -> Self {
        Self { chunks }
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// True when every chunk carries an embedding vector.
    pub fn has_embeddings(&self) -> bool {
        !self.chunks.is_empty() && self.chunks.iter().all(|c| c.embedding.is_some())
    }

    /// Retrieve the top-k chunks for a query.
    ///
    /// `query_vec` should be present when the index was built with
    /// embeddings; without it the term-overlap fallback is used.
    pub fn search(&self, query: &str, query_vec: Option<&[f32]>, k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<ScoredChunk> = match query_vec {
            Some(vec) if self.has_embeddings() => self
                .chunks
                .iter()
                .map(|c| ScoredChunk {
                    doc_id: c.doc_id.clone(),
                    title: c.title.clone(),
                    text: c.text.clone(),
                    score: cosine_similarity(vec, c.embedding.as_deref().unwrap_or(&[])),
                })
                .collect(),
            _ => {
                debug!("Searching policy index with term-overlap fallback");
                self.chunks
                    .iter()
                    .map(|c| ScoredChunk {
                        doc_id: c.doc_id.clone(),
                        title: c.title.clone(),
                        text: c.text.clone(),
                        score: term_overlap(query, &c.text, &c.title),
                    })
                    .collect()
            }
        };

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }

    /// Top-k hits deduplicated to one entry per source document.
    pub fn search_documents(
        &self,
        query: &str,
        query_vec: Option<&[f32]>,
        k: usize,
    ) -> Vec<ScoredChunk> {
        // Over-fetch chunks, then keep the best chunk per document
        let hits = self.search(query, query_vec, k * 4);
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for hit in hits {
            if seen.contains(&hit.doc_id) {
                continue;
            }
            seen.push(hit.doc_id.clone());
            out.push(hit);
            if out.len() == k {
                break;
            }
        }
        out
    }
}

/// Cosine similarity between two vectors; 0.0 on dimension mismatch.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Fraction of query terms (length > 2) appearing in the chunk text or title.
fn term_overlap(query: &str, text: &str, title: &str) -> f32 {
    let haystack = format!("{} {}", title, text).to_lowercase();
    let terms: Vec<String> = query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect();

    if terms.is_empty() {
        return 0.0;
    }

    let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
    hits as f32 / terms.len() as f32
}
