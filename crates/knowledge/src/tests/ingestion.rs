//! Ingestion behaviour across the indexer and both index backends.

use crate::chunker::Chunker;
use crate::embeddings::providers::trigram::TrigramProvider;
use crate::embeddings::EmbeddingProvider;
use crate::indexer::DocumentIndexer;
use crate::memory_index::MemoryIndex;
use crate::sqlite_index::SqliteIndex;
use crate::types::ChunkId;
use crate::vector_index::VectorIndex;
use crate::KnowledgeBase;
use advisor_core::{AppError, AppResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Fails on any chunk whose text contains `poison`.
#[derive(Debug)]
struct FlakyProvider {
    inner: TrigramProvider,
    poison: &'static str,
}

#[async_trait::async_trait]
impl EmbeddingProvider for FlakyProvider {
    fn provider_name(&self) -> &str {
        "flaky"
    }

    fn model_name(&self) -> &str {
        "flaky-v1"
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.contains(self.poison)) {
            return Err(AppError::Knowledge("embedding service rejected chunk".to_string()));
        }
        self.inner.embed_batch(texts).await
    }
}

/// Slow provider that records the peak number of concurrent calls.
#[derive(Debug, Default)]
struct SlowProvider {
    active: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait::async_trait]
impl EmbeddingProvider for SlowProvider {
    fn provider_name(&self) -> &str {
        "slow"
    }

    fn model_name(&self) -> &str {
        "slow-v1"
    }

    fn dimensions(&self) -> usize {
        4
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0, 0.0]).collect())
    }
}

fn document(len: usize) -> String {
    "Clients may withdraw early from the retirement plan subject to a penalty. "
        .chars()
        .cycle()
        .take(len)
        .collect()
}

fn chunk_ids(index: &dyn VectorIndex, dims: usize, top_k: usize) -> Vec<ChunkId> {
    index
        .query(&vec![1.0; dims], top_k)
        .unwrap()
        .into_iter()
        .map(|h| h.chunk_id)
        .collect()
}

#[tokio::test]
async fn test_reingestion_is_idempotent() {
    let backends: Vec<Arc<dyn VectorIndex>> = vec![
        Arc::new(MemoryIndex::new(64)),
        Arc::new(SqliteIndex::open_in_memory(64).unwrap()),
    ];

    for index in backends {
        let indexer = DocumentIndexer::new(
            index.clone(),
            Arc::new(TrigramProvider::new(64)),
            Chunker::new(1000, 100).unwrap(),
        );
        let text = document(2500);

        let first = indexer.ingest("withdrawal.md", &text).await.unwrap();
        let second = indexer.ingest("withdrawal.md", &text).await.unwrap();

        assert_eq!(first.chunks_written, 3);
        assert_eq!(second.chunks_written, first.chunks_written);
        assert_eq!(second.chunks_replaced, first.chunks_written);

        let stats = index.stats().unwrap();
        assert_eq!(stats.chunks as usize, first.chunks_written);

        let ids = chunk_ids(index.as_ref(), 64, 100);
        let unique: HashSet<_> = ids.iter().cloned().collect();
        assert_eq!(ids.len(), unique.len(), "no duplicate chunk ids");
    }
}

#[tokio::test]
async fn test_shorter_reingestion_drops_stale_chunks() {
    let index = Arc::new(MemoryIndex::new(64));
    let indexer = DocumentIndexer::new(
        index.clone(),
        Arc::new(TrigramProvider::new(64)),
        Chunker::new(100, 10).unwrap(),
    );

    indexer.ingest("faq.md", &document(500)).await.unwrap();
    indexer.ingest("faq.md", &document(50)).await.unwrap();

    let ids = chunk_ids(index.as_ref(), 64, 100);
    assert_eq!(ids, vec![ChunkId::new("faq.md", 0)]);
}

#[tokio::test]
async fn test_failed_chunks_are_skipped_and_reported() {
    let index = Arc::new(MemoryIndex::new(64));
    let indexer = DocumentIndexer::new(
        index.clone(),
        Arc::new(FlakyProvider {
            inner: TrigramProvider::new(64),
            poison: "XYZ",
        }),
        Chunker::new(20, 0).unwrap(),
    );

    // Three 20-character chunks; the middle one is poisoned
    let text = format!("{}{}{}", "a".repeat(20), "bbbbbbbbXYZbbbbbbbbb", "c".repeat(20));
    let report = indexer.ingest("mixed.txt", &text).await.unwrap();

    assert_eq!(report.chunks_total, 3);
    assert_eq!(report.chunks_written, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].chunk_index, 1);

    let mut ids = chunk_ids(index.as_ref(), 64, 10);
    ids.sort();
    assert_eq!(
        ids,
        vec![ChunkId::new("mixed.txt", 0), ChunkId::new("mixed.txt", 2)]
    );
}

#[tokio::test]
async fn test_total_embedding_outage_keeps_previous_chunks() {
    let index = Arc::new(MemoryIndex::new(64));
    let healthy = DocumentIndexer::new(
        index.clone(),
        Arc::new(TrigramProvider::new(64)),
        Chunker::new(100, 10).unwrap(),
    );
    let first = healthy.ingest("a.md", &document(250)).await.unwrap();
    assert_eq!(first.chunks_written, 3);

    let down = DocumentIndexer::new(
        index.clone(),
        Arc::new(FlakyProvider {
            inner: TrigramProvider::new(64),
            poison: "withdraw",
        }),
        Chunker::new(100, 10).unwrap(),
    );
    let result = down.ingest("a.md", &document(250)).await;

    assert!(matches!(result, Err(AppError::Ingestion(_))));
    let stats = index.stats().unwrap();
    assert_eq!(stats.sources, 1);
    assert_eq!(stats.chunks, 3);
}

#[tokio::test]
async fn test_embedding_concurrency_is_bounded() {
    let provider = Arc::new(SlowProvider::default());
    let indexer = DocumentIndexer::new(
        Arc::new(MemoryIndex::new(4)),
        provider.clone(),
        Chunker::new(10, 0).unwrap(),
    )
    .with_concurrency(2);

    let report = indexer.ingest("long.txt", &"x".repeat(100)).await.unwrap();

    assert_eq!(report.chunks_written, 10);
    assert!(provider.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_same_source_ingestions_serialize() {
    let index = Arc::new(MemoryIndex::new(64));
    let indexer = Arc::new(DocumentIndexer::new(
        index.clone(),
        Arc::new(TrigramProvider::new(64)),
        Chunker::new(100, 10).unwrap(),
    ));

    let mut handles = Vec::new();
    for len in [450, 90, 270, 180] {
        let indexer = Arc::clone(&indexer);
        handles.push(tokio::spawn(async move {
            indexer.ingest("policy.md", &document(len)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // Whichever ingestion committed last, its chunks are all that remain
    let mut ids = chunk_ids(index.as_ref(), 64, 100);
    ids.sort();
    let chunker = Chunker::new(100, 10).unwrap();
    let expected: Vec<usize> = [450, 90, 270, 180]
        .iter()
        .map(|len| chunker.expected_count(*len))
        .collect();
    assert!(expected.contains(&ids.len()));
    for (i, id) in ids.iter().enumerate() {
        assert_eq!(id.chunk_index as usize, i);
    }
}

#[tokio::test]
async fn test_knowledge_base_persists_between_opens() {
    let temp = TempDir::new().unwrap();

    {
        let kb = KnowledgeBase::open(temp.path(), "enterprise-docs", None)
            .await
            .unwrap();
        kb.indexer
            .ingest("withdrawal.md", "Early withdrawal from the pension plan incurs a 10% penalty.")
            .await
            .unwrap();
    }

    let kb = KnowledgeBase::open(temp.path(), "enterprise-docs", None)
        .await
        .unwrap();
    let stats = kb.stats(temp.path()).unwrap();
    assert_eq!(stats.sources_count, 1);
    assert_eq!(stats.chunks_count, 1);
    assert!(stats.last_ingested_at.is_some());

    let outcome = kb
        .retriever
        .search("early withdrawal penalty", 5)
        .await
        .unwrap();
    assert_eq!(outcome.results()[0].chunk.id().to_string(), "withdrawal.md#0");

    drop(kb);
    crate::clean(temp.path(), "enterprise-docs").unwrap();
    assert!(crate::clean(temp.path(), "enterprise-docs").is_err());
}
