//! Similarity search over an indexed knowledge base.

use crate::embeddings::EmbeddingProvider;
use crate::types::{DocumentChunk, RetrievalResult, SearchOutcome};
use crate::vector_index::{similarity, VectorIndex};
use advisor_core::{AppError, AppResult};
use std::cmp::Ordering;
use std::sync::Arc;

/// Turns a free-text query into ranked chunks.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    min_similarity: f32,
    default_top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            index,
            embedder,
            min_similarity: 0.0,
            default_top_k: 5,
        }
    }

    /// Drop hits scoring below `min_similarity`.
    pub fn with_min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = min_similarity.clamp(0.0, 1.0);
        self
    }

    pub fn with_default_top_k(mut self, top_k: usize) -> Self {
        self.default_top_k = top_k.max(1);
        self
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Search with the configured default `top_k`.
    pub async fn search_default(&self, query: &str) -> AppResult<SearchOutcome> {
        self.search(query, self.default_top_k).await
    }

    /// Rank chunks by relevance to `query`.
    ///
    /// Scores are `1 - cosine distance` clamped to `[0, 1]`. Results are
    /// ordered by score descending with ties broken by ascending
    /// `(source_id, chunk_index)`, and ranked from 1.
    pub async fn search(&self, query: &str, top_k: usize) -> AppResult<SearchOutcome> {
        if top_k == 0 {
            return Err(AppError::SchemaViolation(
                "top_k must be at least 1".to_string(),
            ));
        }
        if query.trim().is_empty() {
            return Err(AppError::SchemaViolation(
                "query cannot be empty".to_string(),
            ));
        }

        if self.index.stats()?.chunks == 0 {
            return Ok(SearchOutcome::NoResults {
                reason: "knowledge base is empty".to_string(),
            });
        }

        let vector = self.embedder.embed(query).await?;
        let hits = self.index.query(&vector, top_k)?;

        let mut results: Vec<RetrievalResult> = hits
            .into_iter()
            .map(|hit| RetrievalResult {
                relevance_score: similarity(hit.distance),
                chunk: DocumentChunk {
                    source_id: hit.chunk_id.source_id,
                    chunk_index: hit.chunk_id.chunk_index,
                    text: hit.payload,
                    embedding: Vec::new(),
                },
                rank: 0,
            })
            .filter(|r| r.relevance_score >= self.min_similarity)
            .collect();

        results.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.chunk.source_id.cmp(&b.chunk.source_id))
                .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
        });
        results.truncate(top_k);
        for (i, result) in results.iter_mut().enumerate() {
            result.rank = i + 1;
        }

        if results.is_empty() {
            tracing::info!(
                "No chunks above the {:.2} similarity floor for query",
                self.min_similarity
            );
            return Ok(SearchOutcome::NoResults {
                reason: format!(
                    "no passage scored above the similarity floor of {:.2}",
                    self.min_similarity
                ),
            });
        }

        tracing::debug!(
            "Retrieved {} chunks (top score: {:.3})",
            results.len(),
            results[0].relevance_score
        );

        Ok(SearchOutcome::Found { results })
    }
}
