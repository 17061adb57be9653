//! Storage abstraction for embedded chunks.
//!
//! The [`VectorStore`] trait defines the two operations an index needs:
//! an all-or-nothing bulk insert at build time and a k-nearest-neighbour
//! lookup at query time. Backends:
//!
//! | Backend | Struct | Storage |
//! |---------|--------|---------|
//! | `sqlite` | [`SqliteStore`] | One SQLite file; vectors as little-endian f32 BLOBs |
//! | `memory` | [`InMemoryStore`] | `Vec` behind a `RwLock` |
//!
//! Both do brute-force cosine similarity over every stored vector; the
//! stores are scoped to a single uploaded document, so the candidate set
//! is small.
//!
//! Implementations must be `Send + Sync`: after the build the index is
//! shared read-only between concurrent questions.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::cmp::Ordering;

use crate::error::{RagError, RagResult};
use crate::models::{EmbeddingRecord, ScoredChunk};

/// Abstract storage backend for one document index.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert_all`](VectorStore::insert_all) | Atomic bulk insert of embedded chunks |
/// | [`nearest`](VectorStore::nearest) | Top-k chunks by cosine similarity |
/// | [`close`](VectorStore::close) | Release connections; later calls fail |
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert every record or none of them.
    async fn insert_all(&self, records: &[EmbeddingRecord]) -> RagResult<()>;

    /// Return at most `k` chunks ordered by descending similarity, ties
    /// broken by chunk index. Chunks scoring below `floor` are dropped.
    async fn nearest(
        &self,
        query_vec: &[f32],
        k: usize,
        floor: Option<f32>,
    ) -> RagResult<Vec<ScoredChunk>>;

    /// Release the backend. Subsequent calls return [`RagError::Search`]
    /// (or [`RagError::Storage`] for inserts).
    async fn close(&self);
}

/// Check that every record carries a vector of the same, non-zero width.
///
/// Returns that width.
pub fn check_dimensions(records: &[EmbeddingRecord]) -> RagResult<usize> {
    let dims = records.first().map(|r| r.vector.len()).unwrap_or(0);
    if dims == 0 {
        return Err(RagError::EmbeddingService(
            "embedding vectors must be non-empty".to_string(),
        ));
    }
    if let Some(bad) = records.iter().find(|r| r.vector.len() != dims) {
        return Err(RagError::EmbeddingService(format!(
            "chunk {} has {} dimensions, expected {}",
            bad.chunk.index,
            bad.vector.len(),
            dims
        )));
    }
    Ok(dims)
}

/// Sort scored chunks by descending score then ascending chunk index,
/// apply the similarity floor, and keep the first `k`.
pub fn rank(mut candidates: Vec<ScoredChunk>, k: usize, floor: Option<f32>) -> Vec<ScoredChunk> {
    if let Some(min) = floor {
        candidates.retain(|c| c.score >= min);
    }
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.chunk.index.cmp(&b.chunk.index))
    });
    candidates.truncate(k);
    candidates
}
