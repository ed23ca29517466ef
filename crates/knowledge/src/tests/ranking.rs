//! Retrieval ranking: score order, tie-breaks, floors and truncation.

use crate::embeddings::EmbeddingProvider;
use crate::memory_index::MemoryIndex;
use crate::retriever::Retriever;
use crate::sqlite_index::SqliteIndex;
use crate::types::{DocumentChunk, SearchOutcome};
use crate::vector_index::VectorIndex;
use advisor_core::AppResult;
use std::collections::HashMap;
use std::sync::Arc;

/// Maps known query strings to fixed vectors.
#[derive(Debug)]
struct FixedProvider {
    vectors: HashMap<String, Vec<f32>>,
}

impl FixedProvider {
    fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for FixedProvider {
    fn provider_name(&self) -> &str {
        "fixed"
    }

    fn model_name(&self) -> &str {
        "fixed-v1"
    }

    fn dimensions(&self) -> usize {
        3
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| self.vectors.get(t).cloned().unwrap_or(vec![0.0, 0.0, 1.0]))
            .collect())
    }
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    v.iter().map(|x| x / norm).collect()
}

fn chunk(source: &str, index: u32, embedding: &[f32]) -> DocumentChunk {
    DocumentChunk {
        source_id: source.to_string(),
        chunk_index: index,
        text: format!("{}#{}", source, index),
        embedding: normalize(embedding),
    }
}

fn backends() -> Vec<Arc<dyn VectorIndex>> {
    vec![
        Arc::new(MemoryIndex::new(3)),
        Arc::new(SqliteIndex::open_in_memory(3).unwrap()),
    ]
}

fn retriever(index: Arc<dyn VectorIndex>) -> Retriever {
    Retriever::new(
        index,
        Arc::new(FixedProvider::new(&[
            ("pension", vec![1.0, 0.0, 0.0]),
            ("opposite", vec![-1.0, 0.0, 0.0]),
        ])),
    )
}

fn ids(outcome: &SearchOutcome) -> Vec<String> {
    outcome
        .results()
        .iter()
        .map(|r| r.chunk.id().to_string())
        .collect()
}

#[tokio::test]
async fn test_scores_descend_and_ranks_start_at_one() {
    for index in backends() {
        index.upsert(&chunk("a.md", 0, &[1.0, 0.0, 0.0])).unwrap();
        index.upsert(&chunk("a.md", 1, &[0.7, 0.7, 0.0])).unwrap();
        index.upsert(&chunk("b.md", 0, &[0.0, 1.0, 0.0])).unwrap();

        let outcome = retriever(index).search("pension", 10).await.unwrap();
        let results = outcome.results();

        assert_eq!(ids(&outcome), vec!["a.md#0", "a.md#1", "b.md#0"]);
        assert!((results[0].relevance_score - 1.0).abs() < 1e-5);
        assert!(results[1].relevance_score > results[2].relevance_score);
        assert_eq!(
            results.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        for r in results {
            assert!((0.0..=1.0).contains(&r.relevance_score));
        }
    }
}

#[tokio::test]
async fn test_ties_break_by_source_then_chunk_index() {
    for index in backends() {
        // Identical vectors inserted out of order
        index.upsert(&chunk("rates.md", 0, &[1.0, 0.0, 0.0])).unwrap();
        index.upsert(&chunk("fees.md", 10, &[1.0, 0.0, 0.0])).unwrap();
        index.upsert(&chunk("fees.md", 2, &[1.0, 0.0, 0.0])).unwrap();
        index.upsert(&chunk("other.md", 0, &[0.0, 1.0, 0.0])).unwrap();

        let outcome = retriever(index).search("pension", 2).await.unwrap();
        assert_eq!(ids(&outcome), vec!["fees.md#2", "fees.md#10"]);
    }
}

#[tokio::test]
async fn test_top_k_limit_respected() {
    for index in backends() {
        for i in 0..10 {
            index
                .upsert(&chunk("guide.md", i, &[1.0, i as f32 / 10.0, 0.0]))
                .unwrap();
        }

        let outcome = retriever(index).search("pension", 3).await.unwrap();
        assert_eq!(ids(&outcome), vec!["guide.md#0", "guide.md#1", "guide.md#2"]);
    }
}

#[tokio::test]
async fn test_zero_scores_cut_by_chunk_id_not_distance() {
    for index in backends() {
        // Both past orthogonal: a.md sits further away but sorts first by id
        index.upsert(&chunk("a.md", 0, &[-0.5, 0.866, 0.0])).unwrap();
        index.upsert(&chunk("b.md", 0, &[-0.2, 0.98, 0.0])).unwrap();

        let retriever = retriever(index);
        let one = retriever.search("pension", 1).await.unwrap();
        let two = retriever.search("pension", 2).await.unwrap();

        assert_eq!(ids(&one), vec!["a.md#0"]);
        assert_eq!(ids(&two), vec!["a.md#0", "b.md#0"]);
        assert_eq!(one.results()[0].relevance_score, 0.0);
    }
}

#[tokio::test]
async fn test_negative_similarity_clamps_to_zero() {
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new(3));
    index.upsert(&chunk("a.md", 0, &[1.0, 0.0, 0.0])).unwrap();

    let outcome = retriever(index).search("opposite", 5).await.unwrap();
    assert_eq!(outcome.results()[0].relevance_score, 0.0);
}

#[tokio::test]
async fn test_similarity_floor_yields_no_results() {
    let index: Arc<dyn VectorIndex> = Arc::new(MemoryIndex::new(3));
    index.upsert(&chunk("a.md", 0, &[0.0, 1.0, 0.0])).unwrap();

    let outcome = retriever(index)
        .with_min_similarity(0.5)
        .search("pension", 5)
        .await
        .unwrap();

    match outcome {
        SearchOutcome::NoResults { reason } => assert!(reason.contains("similarity floor")),
        other => panic!("expected no results, got {:?}", other),
    }
}
