//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the VectorStore trait.
//! Embeddings are stored as little-endian `f32` blobs and searched by brute
//! force; a wiki has a few thousand chunks at most.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, VectorStore};
use crate::storage::{BuildRecord, Chunk, ScoredChunk};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::cmp::Ordering;
use std::path::Path;

/// SQLite vector store
pub struct SqliteIndex {
    conn: Connection,
}

impl SqliteIndex {
    /// Creates a new SqliteIndex instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteIndex)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Dimensions of the stored embeddings, if any are stored
fn stored_dimensions(conn: &Connection) -> StorageResult<Option<usize>> {
    let dims: Option<i64> = conn
        .query_row("SELECT dimensions FROM chunks LIMIT 1", [], |row| row.get(0))
        .optional()?;
    Ok(dims.map(|d| d as usize))
}

fn insert_chunks(
    conn: &Connection,
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
) -> StorageResult<usize> {
    if chunks.is_empty() {
        return Ok(0);
    }

    let expected = match stored_dimensions(conn)? {
        Some(dims) => dims,
        None => embeddings[0].len(),
    };
    if let Some(bad) = embeddings.iter().find(|e| e.len() != expected) {
        return Err(StorageError::DimensionMismatch {
            expected,
            actual: bad.len(),
        });
    }

    let now = Utc::now().to_rfc3339();
    let mut stmt = conn.prepare(
        "INSERT INTO chunks (source, title, position, content, dimensions, embedding, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (chunk, embedding) in chunks.iter().zip(embeddings) {
        stmt.execute(params![
            chunk.source,
            chunk.title,
            chunk.position,
            chunk.content,
            expected as i64,
            encode_embedding(embedding),
            now,
        ])?;
    }
    Ok(chunks.len())
}

impl VectorStore for SqliteIndex {
    fn write_build(
        &mut self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        config_hash: &str,
        documents: usize,
        reset: bool,
    ) -> StorageResult<usize> {
        if chunks.len() != embeddings.len() {
            return Err(StorageError::LengthMismatch {
                chunks: chunks.len(),
                embeddings: embeddings.len(),
            });
        }

        // Dropping the transaction on an early return rolls everything back
        let tx = self.conn.transaction()?;
        if reset {
            let removed = tx.execute("DELETE FROM chunks", [])?;
            tracing::info!("Clearing {} chunks from the index", removed);
        }

        let stored = insert_chunks(&tx, chunks, embeddings)?;

        tx.execute(
            "INSERT INTO builds (built_at, config_hash, documents, chunks) VALUES (?1, ?2, ?3, ?4)",
            params![Utc::now().to_rfc3339(), config_hash, documents as i64, stored as i64],
        )?;
        let build_id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::debug!("Stored {} chunks as build #{}", stored, build_id);
        Ok(stored)
    }

    fn similarity_search(&self, query: &[f32], k: usize) -> StorageResult<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut stmt = self
            .conn
            .prepare("SELECT id, source, title, position, content, embedding FROM chunks")?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                Chunk {
                    source: row.get(1)?,
                    title: row.get(2)?,
                    position: row.get(3)?,
                    content: row.get(4)?,
                },
                row.get::<_, Vec<u8>>(5)?,
            ))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (id, chunk, blob) = row?;
            let embedding = decode_embedding(&blob).ok_or(StorageError::CorruptEmbedding(id))?;
            if embedding.len() != query.len() {
                return Err(StorageError::DimensionMismatch {
                    expected: embedding.len(),
                    actual: query.len(),
                });
            }
            let score = cosine_similarity(query, &embedding);
            scored.push(ScoredChunk { chunk, score });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn count_chunks(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_sources(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT source) FROM chunks",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn latest_build(&self) -> StorageResult<Option<BuildRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, built_at, config_hash, documents, chunks FROM builds ORDER BY id DESC LIMIT 1",
        )?;

        let build = stmt
            .query_row([], |row| {
                Ok(BuildRecord {
                    id: row.get(0)?,
                    built_at: row.get(1)?,
                    config_hash: row.get(2)?,
                    documents: row.get::<_, i64>(3)? as u64,
                    chunks: row.get::<_, i64>(4)? as u64,
                })
            })
            .optional()?;

        Ok(build)
    }
}

/// Cosine similarity of two equal-length vectors
///
/// Returns 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect(),
    )
}
