//! Vector index abstraction for knowledge chunks.
//!
//! Defines a trait for backend-agnostic vector storage and retrieval, plus the
//! distance and ranking helpers every backend shares.

use crate::types::{ChunkId, DocumentChunk, IndexStats};
use advisor_core::{AppError, AppResult};
use std::cmp::Ordering;

/// A nearest-neighbour match.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub chunk_id: ChunkId,

    /// Cosine distance in `[0, 2]`, lower is closer
    pub distance: f32,

    /// Stored chunk text
    pub payload: String,
}

/// Trait for vector index backends.
///
/// All methods take `&self`; implementations synchronise internally so that
/// one index can be shared through an `Arc` by concurrent readers and the
/// per-source serialised writers of the indexer.
pub trait VectorIndex: Send + Sync {
    /// Dimensionality every stored and queried vector must have.
    fn dimensions(&self) -> usize;

    /// Insert or replace a chunk keyed by `(source_id, chunk_index)`.
    fn upsert(&self, chunk: &DocumentChunk) -> AppResult<()>;

    /// The `top_k` nearest chunks, ordered by distance then chunk id.
    fn query(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<IndexHit>>;

    /// Remove every chunk of a source; returns how many were removed.
    fn delete_by_source(&self, source_id: &str) -> AppResult<usize>;

    fn stats(&self) -> AppResult<IndexStats>;

    /// Remove everything.
    fn reset(&self) -> AppResult<()>;

    /// Replace all chunks of `source_id` with `chunks`; returns how many
    /// chunks were removed.
    ///
    /// Backends with transactions override this to make the swap atomic.
    fn replace_source(&self, source_id: &str, chunks: &[DocumentChunk]) -> AppResult<usize> {
        let removed = self.delete_by_source(source_id)?;
        for chunk in chunks {
            self.upsert(chunk)?;
        }
        Ok(removed)
    }
}

/// Reject vectors whose length differs from the index dimensionality.
pub fn check_dimensions(expected: usize, actual: usize) -> AppResult<()> {
    if expected != actual {
        return Err(AppError::Knowledge(format!(
            "Dimension mismatch: index expects {}, got {}",
            expected, actual
        )));
    }
    Ok(())
}

/// Cosine distance `1 - cos(a, b)`. A zero vector is at distance 1 from
/// everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }

    1.0 - dot / (norm_a * norm_b)
}

/// Relevance score for a cosine distance, clamped to `[0, 1]`.
pub fn similarity(distance: f32) -> f32 {
    (1.0 - distance).clamp(0.0, 1.0)
}

/// Sort hits by similarity descending, ties by chunk id, and keep `top_k`.
///
/// The key is the clamped score the retriever reports, so every hit past
/// distance 1 ties at zero and the cut-off falls back to chunk id order.
pub fn rank_hits(mut hits: Vec<IndexHit>, top_k: usize) -> Vec<IndexHit> {
    hits.sort_by(|a, b| {
        similarity(b.distance)
            .partial_cmp(&similarity(a.distance))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
    hits.truncate(top_k);
    hits
}
