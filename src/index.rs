//! Session-scoped document index.
//!
//! A [`DocumentIndex`] holds every embedded chunk of one uploaded document.
//! Its lifecycle is `absent → building → ready → (query)* → released`:
//!
//! - [`DocumentIndex::build`] embeds all chunks first and only then writes
//!   them in a single bulk insert, so a failed embedding batch never leaves
//!   a half-built index behind.
//! - A ready index is never mutated; concurrent queries share it by `&self`.
//! - [`DocumentIndex::release`] closes the backend and deletes its
//!   temporary directory. Dropping the index deletes the directory too, so
//!   storage is reclaimed on every exit path.
//!
//! There is no transition back to `building`: a new document gets a new index.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tempfile::TempDir;

use crate::config::{EmbeddingConfig, IndexBackend, SessionConfig};
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{RagError, RagResult};
use crate::models::{EmbeddingRecord, ScoredChunk, TextChunk};
use crate::pipeline::{with_timeout, DEFAULT_SERVICE_TIMEOUT};
use crate::store::{InMemoryStore, SqliteStore, VectorStore};

/// Observable state of an index handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Ready,
    Released,
}

/// Storage and batching options for [`DocumentIndex::build`].
#[derive(Debug, Clone)]
pub struct IndexOptions {
    pub backend: IndexBackend,
    pub batch_size: usize,
    /// Deadline for each embedding call, including the provider's own retries.
    pub embed_timeout: Duration,
    pub temp_root: Option<PathBuf>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            backend: IndexBackend::Sqlite,
            batch_size: 64,
            embed_timeout: DEFAULT_SERVICE_TIMEOUT,
            temp_root: None,
        }
    }
}

impl IndexOptions {
    pub fn from_config(session: &SessionConfig, embedding: &EmbeddingConfig) -> Self {
        Self {
            backend: session.backend,
            batch_size: embedding.batch_size,
            embed_timeout: Duration::from_secs(embedding.timeout_secs),
            temp_root: session.temp_root.clone(),
        }
    }
}

/// Searchable embedded chunks of one document.
pub struct DocumentIndex {
    id: String,
    document_id: String,
    model: String,
    dims: usize,
    chunk_count: usize,
    store: Box<dyn VectorStore>,
    storage: Mutex<Option<TempDir>>,
    released: AtomicBool,
}

impl std::fmt::Debug for DocumentIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentIndex")
            .field("id", &self.id)
            .field("document_id", &self.document_id)
            .field("model", &self.model)
            .field("dims", &self.dims)
            .field("chunk_count", &self.chunk_count)
            .field("state", &self.state())
            .finish()
    }
}

impl DocumentIndex {
    /// Embed `chunks` with `embedder` and store them.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyDocument`] when `chunks` is empty.
    /// - [`RagError::EmbeddingService`] when any batch fails, returns the
    ///   wrong number of vectors, or vectors of inconsistent width.
    /// - [`RagError::ServiceTimeout`] when a single batch exceeds
    ///   `options.embed_timeout`. The storage insert is not bounded.
    /// - [`RagError::Storage`] when the backend cannot be created or written.
    ///
    /// On error no storage is left behind.
    pub async fn build(
        document_id: &str,
        chunks: Vec<TextChunk>,
        embedder: &dyn EmbeddingProvider,
        options: &IndexOptions,
    ) -> RagResult<Self> {
        if chunks.is_empty() {
            return Err(RagError::EmptyDocument(document_id.to_string()));
        }
        if options.batch_size == 0 {
            return Err(RagError::InvalidConfig(
                "embedding batch_size must be > 0".to_string(),
            ));
        }

        let records = embed_chunks(chunks, embedder, options).await?;
        let dims = crate::store::check_dimensions(&records)?;
        if embedder.dims() != 0 && embedder.dims() != dims {
            tracing::warn!(
                model = embedder.model_name(),
                configured = embedder.dims(),
                actual = dims,
                "embedding width differs from configured dims"
            );
        }

        let (store, storage): (Box<dyn VectorStore>, Option<TempDir>) = match options.backend {
            IndexBackend::Memory => (Box::new(InMemoryStore::new()), None),
            IndexBackend::Sqlite => {
                let dir = temp_dir(options)?;
                let store = SqliteStore::open(&dir.path().join("index.sqlite")).await?;
                (Box::new(store), Some(dir))
            }
        };

        // `storage` drops (and deletes the directory) if the insert fails.
        if let Err(e) = store.insert_all(&records).await {
            store.close().await;
            return Err(e);
        }

        let index = Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            model: embedder.model_name().to_string(),
            dims,
            chunk_count: records.len(),
            store,
            storage: Mutex::new(storage),
            released: AtomicBool::new(false),
        };
        tracing::info!(
            index = %index.id,
            chunks = index.chunk_count,
            dims,
            model = %index.model,
            "index ready"
        );
        Ok(index)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    /// Model name of the embedder the index was built with.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn state(&self) -> IndexState {
        if self.released.load(Ordering::Acquire) {
            IndexState::Released
        } else {
            IndexState::Ready
        }
    }

    /// Directory holding the backing files, if the backend uses any.
    pub fn storage_path(&self) -> Option<PathBuf> {
        self.storage
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|d| d.path().to_path_buf()))
    }

    /// Fail unless the index is ready and `embedder` is the model that built it.
    pub fn check_queryable(&self, embedder: &dyn EmbeddingProvider) -> RagResult<()> {
        if self.state() == IndexState::Released {
            return Err(RagError::Search(format!(
                "index {} has been released",
                self.id
            )));
        }
        if embedder.model_name() != self.model {
            return Err(RagError::Search(format!(
                "index was built with '{}' but the question was embedded with '{}'",
                self.model,
                embedder.model_name()
            )));
        }
        Ok(())
    }

    /// Top-`k` chunks for an already-embedded question.
    pub async fn search_vector(
        &self,
        query_vec: &[f32],
        k: usize,
        floor: Option<f32>,
    ) -> RagResult<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(RagError::InvalidConfig("k must be >= 1".to_string()));
        }
        if self.state() == IndexState::Released {
            return Err(RagError::Search(format!(
                "index {} has been released",
                self.id
            )));
        }
        self.store.nearest(query_vec, k, floor).await
    }

    /// Embed `question` and return the top-`k` chunks with their scores.
    pub async fn search(
        &self,
        embedder: &dyn EmbeddingProvider,
        question: &str,
        k: usize,
        floor: Option<f32>,
    ) -> RagResult<Vec<ScoredChunk>> {
        self.check_queryable(embedder)?;
        let query_vec = embed_query(embedder, question).await?;
        self.search_vector(&query_vec, k, floor).await
    }

    /// Embed `question` and return the top-`k` chunks, most similar first.
    pub async fn query(
        &self,
        embedder: &dyn EmbeddingProvider,
        question: &str,
        k: usize,
    ) -> RagResult<Vec<TextChunk>> {
        Ok(self
            .search(embedder, question, k, None)
            .await?
            .into_iter()
            .map(|s| s.chunk)
            .collect())
    }

    /// Close the backend and delete its storage. Idempotent.
    pub async fn release(&self) -> RagResult<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.store.close().await;
        let dir = self
            .storage
            .lock()
            .map_err(|_| RagError::Storage("index storage lock poisoned".to_string()))?
            .take();
        if let Some(dir) = dir {
            dir.close().map_err(|e| RagError::Storage(e.to_string()))?;
        }
        tracing::info!(index = %self.id, "index released");
        Ok(())
    }
}

async fn embed_chunks(
    chunks: Vec<TextChunk>,
    embedder: &dyn EmbeddingProvider,
    options: &IndexOptions,
) -> RagResult<Vec<EmbeddingRecord>> {
    let mut records = Vec::with_capacity(chunks.len());
    let total_batches = chunks.len().div_ceil(options.batch_size);

    for (batch_no, batch) in chunks.chunks(options.batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        tracing::debug!(batch = batch_no + 1, total_batches, "embedding batch");
        let vectors =
            with_timeout("embedding service", options.embed_timeout, embedder.embed(&texts))
                .await?;
        if vectors.len() != batch.len() {
            return Err(RagError::EmbeddingService(format!(
                "expected {} vectors, got {}",
                batch.len(),
                vectors.len()
            )));
        }
        records.extend(
            batch
                .iter()
                .cloned()
                .zip(vectors)
                .map(|(chunk, vector)| EmbeddingRecord { chunk, vector }),
        );
    }

    Ok(records)
}

fn temp_dir(options: &IndexOptions) -> RagResult<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("sahayak-index-");
    let dir = match &options.temp_root {
        Some(root) => {
            std::fs::create_dir_all(root).map_err(|e| RagError::Storage(e.to_string()))?;
            builder.tempdir_in(root)
        }
        None => builder.tempdir(),
    };
    dir.map_err(|e| RagError::Storage(e.to_string()))
}
