//! Statistics from the index database
//!
//! This module provides functionality for extracting and displaying
//! index statistics from the storage layer.

use crate::storage::{BuildRecord, StorageResult, VectorStore};
use std::io::{self, Write};

/// Index statistics summary
#[derive(Debug, Clone)]
pub struct IndexStatistics {
    /// Number of stored chunks
    pub total_chunks: u64,

    /// Number of distinct pages the chunks came from
    pub total_sources: u64,

    /// Most recent build, if the index was ever built
    pub latest_build: Option<BuildRecord>,
}

impl IndexStatistics {
    pub fn chunks_per_source(&self) -> f64 {
        if self.total_sources == 0 {
            0.0
        } else {
            self.total_chunks as f64 / self.total_sources as f64
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The vector store to query
///
/// # Returns
///
/// * `Ok(IndexStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(store: &dyn VectorStore) -> StorageResult<IndexStatistics> {
    Ok(IndexStatistics {
        total_chunks: store.count_chunks()?,
        total_sources: store.count_sources()?,
        latest_build: store.latest_build()?,
    })
}

/// Writes statistics in a human-readable layout
pub fn write_statistics(out: &mut impl Write, stats: &IndexStatistics) -> io::Result<()> {
    writeln!(out, "=== Index Statistics ===\n")?;

    writeln!(out, "Overview:")?;
    writeln!(out, "  Chunks: {}", stats.total_chunks)?;
    writeln!(out, "  Pages: {}", stats.total_sources)?;
    writeln!(out, "  Chunks per page: {:.1}", stats.chunks_per_source())?;
    writeln!(out)?;

    match &stats.latest_build {
        Some(build) => {
            writeln!(out, "Latest Build (#{}):", build.id)?;
            writeln!(out, "  Built at: {}", build.built_at)?;
            writeln!(out, "  Documents: {}", build.documents)?;
            writeln!(out, "  Chunks: {}", build.chunks)?;
            writeln!(out, "  Config hash: {}", build.config_hash)?;
        }
        None => writeln!(out, "The index has never been built. Run `wiki-bot crawl` first.")?,
    }

    Ok(())
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &IndexStatistics) -> io::Result<()> {
    write_statistics(&mut io::stdout().lock(), stats)
}
