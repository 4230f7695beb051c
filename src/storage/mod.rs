//! Storage module for the document index
//!
//! This module handles all database operations for the index, including:
//! - SQLite database initialization and schema management
//! - Chunk and embedding persistence
//! - Cosine similarity search
//! - Build history

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{cosine_similarity, SqliteIndex};
pub use traits::{StorageError, StorageResult, VectorStore};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Opens or creates the index database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteIndex)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_index(path: &Path) -> StorageResult<SqliteIndex> {
    SqliteIndex::new(path)
}

/// A slice of a document, the unit of retrieval
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    pub title: String,

    /// Index of this chunk within its document
    pub position: u32,
}

/// A chunk returned from a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,

    /// Cosine similarity to the query, in [-1, 1]
    pub score: f32,
}

/// Represents an index build
#[derive(Debug, Clone)]
pub struct BuildRecord {
    pub id: i64,
    pub built_at: String,
    pub config_hash: String,
    pub documents: u64,
    pub chunks: u64,
}
