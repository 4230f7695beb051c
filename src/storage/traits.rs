//! Storage traits and error types
//!
//! This module defines the trait interface for vector store backends and
//! associated error types.

use crate::storage::{BuildRecord, Chunk, ScoredChunk};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Got {embeddings} embeddings for {chunks} chunks")]
    LengthMismatch { chunks: usize, embeddings: usize },

    #[error("Embedding has {actual} dimensions, index uses {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Corrupt embedding blob for chunk {0}")]
    CorruptEmbedding(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for vector store implementations
///
/// Holds embedded chunks and answers nearest-neighbour queries.
pub trait VectorStore: Send {
    /// Stores a build's chunks and records the build, all or nothing
    ///
    /// # Arguments
    ///
    /// * `chunks` - The chunks to store
    /// * `embeddings` - One vector per chunk, in the same order
    /// * `config_hash` - Hash of the configuration the build used
    /// * `documents` - Number of documents the chunks came from
    /// * `reset` - Remove every existing chunk first (build history is kept)
    ///
    /// # Returns
    ///
    /// The number of chunks stored. On error the store is left unchanged.
    fn write_build(
        &mut self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
        config_hash: &str,
        documents: usize,
        reset: bool,
    ) -> StorageResult<usize>;

    /// Returns the `k` chunks most similar to `query`, best first
    fn similarity_search(&self, query: &[f32], k: usize) -> StorageResult<Vec<ScoredChunk>>;

    /// Counts stored chunks
    fn count_chunks(&self) -> StorageResult<u64>;

    /// Counts distinct source pages among stored chunks
    fn count_sources(&self) -> StorageResult<u64>;

    /// Gets the most recent build
    fn latest_build(&self) -> StorageResult<Option<BuildRecord>>;
}
