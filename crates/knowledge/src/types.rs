//! Knowledge system type definitions.

use crate::embeddings::EmbeddingConfig;
use advisor_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Citation identity of a chunk: the source it came from and its 0-based
/// position within that source.
///
/// Ordering is by source id, then chunk index. Retrieval uses this ordering
/// to break score ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    #[serde(rename = "sourceId")]
    pub source_id: String,

    #[serde(rename = "chunkIndex")]
    pub chunk_index: u32,
}

impl ChunkId {
    pub fn new(source_id: impl Into<String>, chunk_index: u32) -> Self {
        Self {
            source_id: source_id.into(),
            chunk_index,
        }
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.source_id, self.chunk_index)
    }
}

/// A text chunk with its embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    #[serde(rename = "sourceId")]
    pub source_id: String,

    #[serde(rename = "chunkIndex")]
    pub chunk_index: u32,

    pub text: String,

    /// Empty when the chunk was read back from an index for display.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
}

impl DocumentChunk {
    pub fn id(&self) -> ChunkId {
        ChunkId::new(self.source_id.clone(), self.chunk_index)
    }
}

/// One ranked retrieval hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: DocumentChunk,

    /// Similarity in `[0, 1]`, higher is better
    #[serde(rename = "relevanceScore")]
    pub relevance_score: f32,

    /// 1-based rank within this result set
    pub rank: usize,
}

/// Outcome of a retrieval.
///
/// An empty result is a normal business outcome, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SearchOutcome {
    Found { results: Vec<RetrievalResult> },
    NoResults { reason: String },
}

impl SearchOutcome {
    pub fn results(&self) -> &[RetrievalResult] {
        match self {
            SearchOutcome::Found { results } => results,
            SearchOutcome::NoResults { .. } => &[],
        }
    }
}

/// A chunk that could not be embedded during ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFailure {
    #[serde(rename = "chunkIndex")]
    pub chunk_index: u32,
    pub reason: String,
}

/// Result of ingesting one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    #[serde(rename = "sourceId")]
    pub source_id: String,

    /// Chunks produced by the splitter
    #[serde(rename = "chunksTotal")]
    pub chunks_total: usize,

    /// Chunks embedded and committed to the index
    #[serde(rename = "chunksWritten")]
    pub chunks_written: usize,

    /// Chunks previously stored for this source that were replaced
    #[serde(rename = "chunksReplaced")]
    pub chunks_replaced: usize,

    pub failures: Vec<ChunkFailure>,
}

/// Statistics from ingesting a file or folder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestStats {
    pub sources: u32,
    pub chunks: u32,

    /// Sources that could not be parsed plus chunks that could not be embedded
    pub failures: u32,

    #[serde(rename = "bytesProcessed")]
    pub bytes_processed: u64,

    #[serde(rename = "durationSecs")]
    pub duration_secs: f64,
}

/// Raw counts reported by a vector index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub sources: u32,
    pub chunks: u32,
}

/// Statistics for a persisted knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseStats {
    #[serde(rename = "baseName")]
    pub base_name: String,

    #[serde(rename = "sourcesCount")]
    pub sources_count: u32,

    #[serde(rename = "chunksCount")]
    pub chunks_count: u32,

    #[serde(rename = "dbSizeBytes")]
    pub db_size_bytes: u64,

    #[serde(rename = "lastIngestedAt")]
    pub last_ingested_at: Option<DateTime<Utc>>,
}

/// Configuration for a knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeBaseConfig {
    /// Name of the knowledge base
    #[serde(default)]
    pub name: String,

    /// Chunk window in characters
    #[serde(rename = "windowSize", default = "default_window_size")]
    pub window_size: usize,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Retrieval hits scoring below this are dropped
    #[serde(rename = "minSimilarity", default = "default_min_similarity")]
    pub min_similarity: f32,

    #[serde(rename = "topK", default = "default_top_k")]
    pub top_k: usize,

    /// Chunks embedded concurrently during ingestion
    #[serde(rename = "embeddingConcurrency", default = "default_embedding_concurrency")]
    pub embedding_concurrency: usize,

    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

fn default_window_size() -> usize {
    1000
}

fn default_overlap() -> usize {
    100
}

fn default_min_similarity() -> f32 {
    0.1
}

fn default_top_k() -> usize {
    5
}

fn default_embedding_concurrency() -> usize {
    4
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            window_size: default_window_size(),
            overlap: default_overlap(),
            min_similarity: default_min_similarity(),
            top_k: default_top_k(),
            embedding_concurrency: default_embedding_concurrency(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl KnowledgeBaseConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.window_size == 0 {
            return Err(AppError::Config(
                "Knowledge windowSize must be greater than zero".to_string(),
            ));
        }

        if self.overlap >= self.window_size {
            return Err(AppError::Config(format!(
                "Knowledge overlap ({}) must be smaller than windowSize ({})",
                self.overlap, self.window_size
            )));
        }

        if self.top_k == 0 {
            return Err(AppError::Config(
                "Knowledge topK must be greater than zero".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(AppError::Config(format!(
                "Knowledge minSimilarity must be within [0, 1], got {}",
                self.min_similarity
            )));
        }

        if self.embedding.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
