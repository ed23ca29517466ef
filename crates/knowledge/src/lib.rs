//! Knowledge base management system.
//!
//! Provides local-first retrieval over enterprise documents: documents are
//! split into overlapping character windows, embedded, and stored in a
//! vector index (in memory or SQLite) from which the [`Retriever`] ranks
//! passages for a query.

pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod indexer;
pub mod memory_index;
pub mod parser;
pub mod retriever;
pub mod sqlite_index;
pub mod types;
pub mod vector_index;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use chunker::Chunker;
pub use embeddings::{create_provider, EmbeddingConfig, EmbeddingProvider};
pub use indexer::DocumentIndexer;
pub use memory_index::MemoryIndex;
pub use retriever::Retriever;
pub use sqlite_index::SqliteIndex;
pub use types::{
    BaseStats, ChunkFailure, ChunkId, DocumentChunk, IndexStats, IngestReport, IngestStats,
    KnowledgeBaseConfig, RetrievalResult, SearchOutcome,
};
pub use vector_index::{IndexHit, VectorIndex};

use advisor_core::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;

/// A persisted knowledge base: SQLite index plus its indexer and retriever.
pub struct KnowledgeBase {
    pub config: KnowledgeBaseConfig,
    pub index: Arc<SqliteIndex>,
    pub indexer: Arc<DocumentIndexer>,
    pub retriever: Arc<Retriever>,
}

impl KnowledgeBase {
    /// Open (creating if needed) the knowledge base `base_name` in `workspace`.
    ///
    /// `endpoint` overrides the embedding endpoint of HTTP providers when the
    /// base config does not set one.
    pub async fn open(
        workspace: &Path,
        base_name: &str,
        endpoint: Option<&str>,
    ) -> AppResult<Self> {
        let mut config = config::load_config(workspace, base_name)?;
        if config.embedding.endpoint.is_none() {
            config.embedding.endpoint = endpoint.map(str::to_string);
        }

        let embedder = create_provider(&config.embedding).await?;
        let index = Arc::new(SqliteIndex::open(
            &config::get_index_path(workspace, base_name),
            embedder.dimensions(),
        )?);

        let chunker = Chunker::new(config.window_size, config.overlap)?;
        let indexer = DocumentIndexer::new(index.clone(), embedder.clone(), chunker)
            .with_concurrency(config.embedding_concurrency);
        let retriever = Retriever::new(index.clone(), embedder)
            .with_min_similarity(config.min_similarity)
            .with_default_top_k(config.top_k);

        config::save_config(workspace, &config)?;

        tracing::info!(
            "Opened knowledge base '{}' ({} embeddings, {} dimensions)",
            base_name,
            config.embedding.provider,
            index.dimensions()
        );

        Ok(Self {
            config,
            index,
            indexer: Arc::new(indexer),
            retriever: Arc::new(retriever),
        })
    }

    pub fn stats(&self, workspace: &Path) -> AppResult<BaseStats> {
        let counts = self.index.stats()?;
        let index_path = config::get_index_path(workspace, &self.config.name);

        Ok(BaseStats {
            base_name: self.config.name.clone(),
            sources_count: counts.sources,
            chunks_count: counts.chunks,
            db_size_bytes: std::fs::metadata(&index_path).map(|m| m.len()).unwrap_or(0),
            last_ingested_at: self.index.last_ingested_at()?,
        })
    }
}

/// Clean (reset) a knowledge base.
pub fn clean(workspace: &Path, base_name: &str) -> AppResult<()> {
    tracing::info!("Cleaning knowledge base '{}'", base_name);

    let index_path = config::get_index_path(workspace, base_name);
    if !index_path.exists() {
        return Err(AppError::Knowledge(format!(
            "Knowledge base '{}' does not exist",
            base_name
        )));
    }

    std::fs::remove_file(&index_path)?;

    tracing::info!("Knowledge base '{}' cleaned", base_name);
    Ok(())
}
