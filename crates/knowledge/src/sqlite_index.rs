//! SQLite-backed vector index for knowledge chunks.
//!
//! Embeddings are stored as little-endian `f32` BLOBs and scored by an
//! exhaustive scan, which is adequate for document collections of a few
//! thousand chunks.

use crate::types::{ChunkId, DocumentChunk, IndexStats};
use crate::vector_index::{check_dimensions, cosine_distance, rank_hits, IndexHit, VectorIndex};
use advisor_core::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Persistent vector index in a single SQLite file.
pub struct SqliteIndex {
    dimensions: usize,
    conn: Mutex<Connection>,
}

fn db_err(context: &str) -> impl Fn(rusqlite::Error) -> AppError + '_ {
    move |e| AppError::Knowledge(format!("{}: {}", context, e))
}

impl SqliteIndex {
    /// Open (or create) the index at `db_path`.
    ///
    /// An existing index built with a different dimensionality is rejected.
    pub fn open(db_path: &Path, dimensions: usize) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Knowledge(format!("Failed to create index directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path).map_err(db_err("Failed to open SQLite index"))?;
        let index = Self::init(conn, dimensions)?;

        tracing::debug!("Opened SQLite index at {:?}", db_path);
        Ok(index)
    }

    pub fn open_in_memory(dimensions: usize) -> AppResult<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("Failed to open SQLite index"))?;
        Self::init(conn, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS chunks (
                source_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                embedding BLOB NOT NULL,
                ingested_at TEXT NOT NULL,
                PRIMARY KEY (source_id, chunk_index)
            );
            "#,
        )
        .map_err(db_err("Failed to create tables"))?;

        let stored: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'dimensions'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("Failed to read index metadata"))?;

        match stored {
            Some(value) => {
                let stored_dims: usize = value.parse().map_err(|_| {
                    AppError::Knowledge(format!("Corrupt dimensions entry in index: {}", value))
                })?;
                if stored_dims != dimensions {
                    return Err(AppError::Knowledge(format!(
                        "Dimension mismatch: index was built with {} dimensions, embedding provider yields {}. Run 'advisor knowledge clean' and re-ingest.",
                        stored_dims, dimensions
                    )));
                }
            }
            None => {
                conn.execute(
                    "INSERT INTO meta (key, value) VALUES ('dimensions', ?1)",
                    params![dimensions.to_string()],
                )
                .map_err(db_err("Failed to write index metadata"))?;
            }
        }

        Ok(Self {
            dimensions,
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Knowledge("SQLite index lock poisoned".to_string()))
    }

    /// Timestamp of the most recent ingestion, if any.
    pub fn last_ingested_at(&self) -> AppResult<Option<DateTime<Utc>>> {
        let conn = self.lock()?;
        let latest: Option<String> = conn
            .query_row("SELECT MAX(ingested_at) FROM chunks", [], |row| row.get(0))
            .map_err(db_err("Failed to read ingestion time"))?;

        Ok(latest
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&Utc)))
    }
}

fn insert_chunk(conn: &Connection, chunk: &DocumentChunk, now: &str) -> AppResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO chunks (source_id, chunk_index, text, embedding, ingested_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            chunk.source_id,
            chunk.chunk_index as i64,
            chunk.text,
            embedding_to_bytes(&chunk.embedding),
            now,
        ],
    )
    .map_err(db_err("Failed to insert chunk"))?;
    Ok(())
}

impl VectorIndex for SqliteIndex {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn upsert(&self, chunk: &DocumentChunk) -> AppResult<()> {
        check_dimensions(self.dimensions, chunk.embedding.len())?;
        let conn = self.lock()?;
        insert_chunk(&conn, chunk, &Utc::now().to_rfc3339())
    }

    fn query(&self, vector: &[f32], top_k: usize) -> AppResult<Vec<IndexHit>> {
        check_dimensions(self.dimensions, vector.len())?;

        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT source_id, chunk_index, text, embedding FROM chunks")
            .map_err(db_err("Failed to prepare query"))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Vec<u8>>(3)?,
                ))
            })
            .map_err(db_err("Failed to query chunks"))?;

        let mut hits = Vec::new();
        for row in rows {
            let (source_id, chunk_index, text, blob) = row.map_err(db_err("Failed to read chunk"))?;
            let embedding = bytes_to_embedding(&blob)?;
            hits.push(IndexHit {
                chunk_id: ChunkId::new(source_id, chunk_index as u32),
                distance: cosine_distance(vector, &embedding),
                payload: text,
            });
        }

        let ranked = rank_hits(hits, top_k);
        tracing::debug!("Retrieved {} chunks (requested top-{})", ranked.len(), top_k);
        Ok(ranked)
    }

    fn delete_by_source(&self, source_id: &str) -> AppResult<usize> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM chunks WHERE source_id = ?1", params![source_id])
            .map_err(db_err("Failed to delete chunks"))
    }

    fn stats(&self) -> AppResult<IndexStats> {
        let conn = self.lock()?;
        let (sources, chunks): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(DISTINCT source_id), COUNT(*) FROM chunks",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(db_err("Failed to count chunks"))?;

        Ok(IndexStats {
            sources: sources as u32,
            chunks: chunks as u32,
        })
    }

    fn reset(&self) -> AppResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM chunks", [])
            .map_err(db_err("Failed to delete chunks"))?;
        tracing::info!("Reset knowledge base index");
        Ok(())
    }

    fn replace_source(&self, source_id: &str, chunks: &[DocumentChunk]) -> AppResult<usize> {
        for chunk in chunks {
            check_dimensions(self.dimensions, chunk.embedding.len())?;
        }

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(db_err("Failed to begin transaction"))?;

        let removed = tx
            .execute("DELETE FROM chunks WHERE source_id = ?1", params![source_id])
            .map_err(db_err("Failed to delete chunks"))?;

        let now = Utc::now().to_rfc3339();
        for chunk in chunks {
            insert_chunk(&tx, chunk, &now)?;
        }

        tx.commit().map_err(db_err("Failed to commit chunks"))?;
        Ok(removed)
    }
}

fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn bytes_to_embedding(bytes: &[u8]) -> AppResult<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(AppError::Knowledge(
            "Invalid embedding bytes length".to_string(),
        ));
    }

    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
