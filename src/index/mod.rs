//! Document index: splitting, embedding, and retrieval
//!
//! Scraped documents are the only input. They are split into overlapping
//! chunks, embedded in batches, and written to a [`VectorStore`]. Questions
//! are answered from the top-k chunks nearest to an embedded query.

mod splitter;

pub use splitter::{TextSplitter, DEFAULT_SEPARATORS};

use crate::config::IndexConfig;
use crate::crawler::Document;
use crate::llm::{Embedder, LlmError};
use crate::storage::{ScoredChunk, StorageError, VectorStore};
use thiserror::Error;

/// Errors raised while building or querying the index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Invalid index settings: {0}")]
    InvalidSettings(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[from] LlmError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for index operations
pub type IndexResult<T> = Result<T, IndexError>;

/// Builds (or extends) the index from scraped documents
///
/// Every batch is embedded before the store is touched, and the chunks and
/// their build record are written together. A failed embedding call leaves
/// the previous index and its build record in place.
///
/// # Arguments
///
/// * `store` - Destination vector store
/// * `embedder` - Embedding capability
/// * `documents` - Scraped documents
/// * `config` - Chunking and batching settings
/// * `config_hash` - Hash of the configuration, recorded with the build
/// * `reset` - Clear existing chunks first
///
/// # Returns
///
/// * `Ok(usize)` - Number of chunks written
/// * `Err(IndexError)` - Splitting, embedding, or storage failed
pub async fn populate_index(
    store: &mut dyn VectorStore,
    embedder: &dyn Embedder,
    documents: &[Document],
    config: &IndexConfig,
    config_hash: &str,
    reset: bool,
) -> IndexResult<usize> {
    let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;
    let chunks = splitter.split_documents(documents);
    tracing::info!(
        "Split {} documents into {} chunks ({} chars, {} overlap)",
        documents.len(),
        chunks.len(),
        splitter.chunk_size(),
        splitter.chunk_overlap()
    );

    let batch_size = config.embedding_batch_size.max(1);
    let mut embeddings = Vec::with_capacity(chunks.len());
    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
        let vectors = embedder.embed(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(IndexError::Embedding(LlmError::Parse(format!(
                "expected {} embeddings, got {}",
                batch.len(),
                vectors.len()
            ))));
        }
        embeddings.extend(vectors);
        tracing::debug!("Embedded {}/{} chunks", embeddings.len(), chunks.len());
    }

    let stored = store.write_build(&chunks, &embeddings, config_hash, documents.len(), reset)?;
    tracing::info!("Vector store created with {} chunks", stored);

    Ok(stored)
}

/// Returns the `k` chunks nearest to `query`
pub async fn retrieve(
    store: &dyn VectorStore,
    embedder: &dyn Embedder,
    query: &str,
    k: usize,
) -> IndexResult<Vec<ScoredChunk>> {
    let mut vectors = embedder.embed(&[query.to_string()]).await?;
    let query_vector = vectors
        .pop()
        .ok_or_else(|| LlmError::Parse("no embedding returned for query".to_string()))?;
    Ok(store.similarity_search(&query_vector, k)?)
}
