//! In-memory [`VectorStore`] implementation.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety. Vector search
//! is brute-force cosine similarity over all stored vectors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use super::{check_dimensions, rank, VectorStore};
use crate::embedding::cosine_similarity;
use crate::error::{RagError, RagResult};
use crate::models::{EmbeddingRecord, ScoredChunk};

/// In-memory store for short sessions and tests.
pub struct InMemoryStore {
    records: RwLock<Vec<EmbeddingRecord>>,
    closed: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> RagResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RagError::Search("in-memory index has been closed".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> RagError {
    RagError::Search("in-memory index lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn insert_all(&self, records: &[EmbeddingRecord]) -> RagResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RagError::Storage("in-memory index has been closed".to_string()));
        }
        let dims = check_dimensions(records)?;
        let mut stored = self.records.write().map_err(|_| poisoned())?;
        if let Some(existing) = stored.first() {
            if existing.vector.len() != dims {
                return Err(RagError::EmbeddingService(format!(
                    "index holds {}-dimensional vectors, got {}",
                    existing.vector.len(),
                    dims
                )));
            }
        }
        stored.extend(records.iter().cloned());
        Ok(())
    }

    async fn nearest(
        &self,
        query_vec: &[f32],
        k: usize,
        floor: Option<f32>,
    ) -> RagResult<Vec<ScoredChunk>> {
        self.ensure_open()?;
        let stored = self.records.read().map_err(|_| poisoned())?;
        if let Some(first) = stored.first() {
            if first.vector.len() != query_vec.len() {
                return Err(RagError::Search(format!(
                    "query has {} dimensions, index has {}",
                    query_vec.len(),
                    first.vector.len()
                )));
            }
        }
        let candidates = stored
            .iter()
            .map(|r| ScoredChunk {
                chunk: r.chunk.clone(),
                score: cosine_similarity(query_vec, &r.vector),
            })
            .collect();
        Ok(rank(candidates, k, floor))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Ok(mut stored) = self.records.write() {
            stored.clear();
        }
    }
}
