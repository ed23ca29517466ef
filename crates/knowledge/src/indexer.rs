//! Document indexer: chunk, embed and commit sources to a vector index.

use crate::chunker::Chunker;
use crate::embeddings::EmbeddingProvider;
use crate::parser;
use crate::types::{ChunkFailure, DocumentChunk, IngestReport, IngestStats};
use crate::vector_index::VectorIndex;
use advisor_core::{AppError, AppResult};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use walkdir::WalkDir;

/// Ingests raw documents into a vector index.
///
/// Ingestions of the same source are serialised; different sources proceed
/// in parallel. A source's chunks are only committed after every embedding
/// has been attempted, so an abandoned ingestion leaves the index untouched.
pub struct DocumentIndexer {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunker: Chunker,
    concurrency: usize,
    source_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl DocumentIndexer {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        chunker: Chunker,
    ) -> Self {
        Self {
            index,
            embedder,
            chunker,
            concurrency: 4,
            source_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Maximum number of chunks embedded at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    fn source_lock(&self, source_id: &str) -> AppResult<Arc<tokio::sync::Mutex<()>>> {
        let mut locks = self
            .source_locks
            .lock()
            .map_err(|_| AppError::Ingestion("Source lock table poisoned".to_string()))?;
        Ok(Arc::clone(locks.entry(source_id.to_string()).or_default()))
    }

    /// Drop the table entry for `source_id` once no other ingestion holds it.
    fn release_source_lock(&self, source_id: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let Ok(mut locks) = self.source_locks.lock() else {
            return;
        };
        let idle = locks
            .get(source_id)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
        if idle {
            locks.remove(source_id);
        }
    }

    /// Ingest (or re-ingest) one source.
    ///
    /// Chunks that fail to embed are logged and reported; the rest are
    /// written under their original indices.
    pub async fn ingest(&self, source_id: &str, raw_text: &str) -> AppResult<IngestReport> {
        if source_id.trim().is_empty() {
            return Err(AppError::Ingestion("Source id cannot be empty".to_string()));
        }

        let lock = self.source_lock(source_id)?;
        let result = {
            let _guard = lock.lock().await;
            self.ingest_locked(source_id, raw_text).await
        };
        self.release_source_lock(source_id, lock);
        result
    }

    async fn ingest_locked(&self, source_id: &str, raw_text: &str) -> AppResult<IngestReport> {
        let pieces = self.chunker.split(raw_text);
        let chunks_total = pieces.len();
        let dimensions = self.index.dimensions();

        let embedded: Vec<(u32, String, AppResult<Vec<f32>>)> = stream::iter(pieces)
            .map(|piece| {
                let embedder = Arc::clone(&self.embedder);
                async move {
                    let result = embedder.embed(&piece.text).await.and_then(|vector| {
                        if vector.len() == dimensions {
                            Ok(vector)
                        } else {
                            Err(AppError::Knowledge(format!(
                                "Dimension mismatch: index expects {}, got {}",
                                dimensions,
                                vector.len()
                            )))
                        }
                    });
                    (piece.index, piece.text, result)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut chunks = Vec::with_capacity(chunks_total);
        let mut failures = Vec::new();

        for (chunk_index, text, result) in embedded {
            match result {
                Ok(embedding) => chunks.push(DocumentChunk {
                    source_id: source_id.to_string(),
                    chunk_index,
                    text,
                    embedding,
                }),
                Err(e) => {
                    tracing::warn!(
                        source_id,
                        chunk_index,
                        "Skipping chunk that failed to embed: {}",
                        e
                    );
                    failures.push(ChunkFailure {
                        chunk_index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if chunks.is_empty() && chunks_total > 0 {
            tracing::warn!(source_id, chunks_total, "Every chunk failed to embed; index left as is");
            return Err(AppError::Ingestion(format!(
                "No chunk of '{}' could be embedded ({} failed): {}",
                source_id,
                failures.len(),
                failures
                    .first()
                    .map(|f| f.reason.as_str())
                    .unwrap_or("unknown error")
            )));
        }

        let chunks_replaced = self.index.replace_source(source_id, &chunks)?;

        tracing::info!(
            source_id,
            chunks_written = chunks.len(),
            chunks_failed = failures.len(),
            chunks_replaced,
            "Ingested source"
        );

        Ok(IngestReport {
            source_id: source_id.to_string(),
            chunks_total,
            chunks_written: chunks.len(),
            chunks_replaced,
            failures,
        })
    }

    /// Ingest a single file, or every supported file below a folder.
    ///
    /// Source ids are paths relative to `root` (the file name when `root` is
    /// a file), with `/` separators. Files that cannot be parsed are counted
    /// as failures and skipped.
    pub async fn ingest_path(&self, root: &Path) -> AppResult<IngestStats> {
        let start = Instant::now();

        if !root.exists() {
            return Err(AppError::Ingestion(format!(
                "Path does not exist: {:?}",
                root
            )));
        }

        let files: Vec<(String, std::path::PathBuf)> = if root.is_file() {
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| root.display().to_string());
            vec![(name, root.to_path_buf())]
        } else {
            WalkDir::new(root)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| parser::ContentType::from_path(e.path()).is_supported())
                .filter_map(|e| {
                    let relative = e.path().strip_prefix(root).ok()?;
                    let id = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    Some((id, e.path().to_path_buf()))
                })
                .collect()
        };

        let mut stats = IngestStats::default();

        for (source_id, path) in files {
            let text = match parser::parse_file(&path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Skipping {:?}: {}", path, e);
                    stats.failures += 1;
                    continue;
                }
            };

            let report = match self.ingest(&source_id, &text).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", source_id, e);
                    stats.failures += 1;
                    continue;
                }
            };
            stats.sources += 1;
            stats.chunks += report.chunks_written as u32;
            stats.failures += report.failures.len() as u32;
            stats.bytes_processed += text.len() as u64;
        }

        stats.duration_secs = start.elapsed().as_secs_f64();

        tracing::info!(
            "Ingestion completed: {} sources, {} chunks, {} failures, {} bytes in {:.2}s",
            stats.sources,
            stats.chunks,
            stats.failures,
            stats.bytes_processed,
            stats.duration_secs
        );

        Ok(stats)
    }

    /// Whether the index holds no chunks at all.
    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.index.stats()?.chunks == 0)
    }
}
