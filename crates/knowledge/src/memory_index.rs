//! In-process vector index.

use crate::types::{ChunkId, DocumentChunk, IndexStats};
use crate::vector_index::{check_dimensions, cosine_distance, rank_hits, IndexHit, VectorIndex};
use advisor_core::{AppError, AppResult};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Exhaustive-scan index held in memory.
pub struct MemoryIndex {
    dimensions: usize,
    chunks: RwLock<BTreeMap<ChunkId, DocumentChunk>>,
}

impl MemoryIndex {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            chunks: RwLock::new(BTreeMap::new()),
        }
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, BTreeMap<ChunkId, DocumentChunk>>> {
        self.chunks
            .read()
            .map_err(|_| AppError::Knowledge("Memory index lock poisoned".to_string()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, BTreeMap<ChunkId, DocumentChunk>>> {
        self.chunks
            .write()
            .map_err(|_| AppError::Knowledge("Memory index lock poisoned".to_string()))
    }

    fn remove_source(chunks: &mut BTreeMap<ChunkId, DocumentChunk>, source_id: &str) -> usize {
        let before = chunks.len();
        chunks.retain(|id, _| id.source_id != source_id);
        before - chunks.len()
    }
}

impl VectorIndex for MemoryIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn upsert(&self, chunk: &DocumentChunk) -> AppResult<()> {
        check_dimensions(self.dimensions, chunk.embedding.len())?;
        self.write()?.insert(chunk.id(), chunk.clone());
        Ok(())
    }

    fn query(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<IndexHit>> {
        check_dimensions(self.dimensions, vector.len())?;

        let hits = self
            .read()?
            .iter()
            .map(|(id, chunk)| IndexHit {
                chunk_id: id.clone(),
                distance: cosine_distance(vector, &chunk.embedding),
                payload: chunk.text.clone(),
            })
            .collect();

        Ok(rank_hits(hits, top_k))
    }

    fn delete_by_source(&self, source_id: &str) -> AppResult<usize> {
        Ok(Self::remove_source(&mut *self.write()?, source_id))
    }

    fn stats(&self) -> AppResult<IndexStats> {
        let chunks = self.read()?;
        let sources: BTreeSet<&str> = chunks.keys().map(|id| id.source_id.as_str()).collect();
        Ok(IndexStats {
            sources: sources.len() as u32,
            chunks: chunks.len() as u32,
        })
    }

    fn reset(&self) -> AppResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn replace_source(&self, source_id: &str, chunks: &[DocumentChunk]) -> AppResult<usize> {
        for chunk in chunks {
            check_dimensions(self.dimensions, chunk.embedding.len())?;
        }

        // Single write guard so readers never observe a half-replaced source
        let mut guard = self.write()?;
        let removed = Self::remove_source(&mut guard, source_id);
        for chunk in chunks {
            guard.insert(chunk.id(), chunk.clone());
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(source: &str, index: u32, embedding: Vec<f32>) -> DocumentChunk {
        DocumentChunk {
            source_id: source.to_string(),
            chunk_index: index,
            text: format!("{} chunk {}", source, index),
            embedding,
        }
    }

    #[test]
    fn test_upsert_and_query() {
        let index = MemoryIndex::new(3);
        index.upsert(&chunk("a.md", 0, vec![1.0, 0.0, 0.0])).unwrap();
        index.upsert(&chunk("a.md", 1, vec![0.0, 1.0, 0.0])).unwrap();

        let hits = index.query(&[1.0, 0.0, 0.0], 5).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, ChunkId::new("a.md", 0));
        assert_eq!(hits[0].payload, "a.md chunk 0");
    }

    #[test]
    fn test_upsert_same_id_replaces() {
        let index = MemoryIndex::new(2);
        index.upsert(&chunk("a.md", 0, vec![1.0, 0.0])).unwrap();
        index.upsert(&chunk("a.md", 0, vec![0.0, 1.0])).unwrap();
        assert_eq!(index.stats().unwrap().chunks, 1);
    }

    #[test]
    fn test_replace_source_leaves_other_sources() {
        let index = MemoryIndex::new(2);
        index.upsert(&chunk("a.md", 0, vec![1.0, 0.0])).unwrap();
        index.upsert(&chunk("a.md", 1, vec![1.0, 0.0])).unwrap();
        index.upsert(&chunk("b.md", 0, vec![0.0, 1.0])).unwrap();

        let removed = index
            .replace_source("a.md", &[chunk("a.md", 0, vec![1.0, 1.0])])
            .unwrap();

        assert_eq!(removed, 2);
        assert_eq!(index.stats().unwrap(), IndexStats { sources: 2, chunks: 2 });
    }

    #[test]
    fn test_dimension_mismatch_is_error() {
        let index = MemoryIndex::new(3);
        assert!(index.upsert(&chunk("a.md", 0, vec![1.0])).is_err());
        assert!(index.query(&[1.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_reset() {
        let index = MemoryIndex::new(2);
        index.upsert(&chunk("a.md", 0, vec![1.0, 0.0])).unwrap();
        index.reset().unwrap();
        assert_eq!(index.stats().unwrap(), IndexStats::default());
    }
}
