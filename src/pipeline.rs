//! Query orchestration.
//!
//! [`RagPipeline`] wires the extractor, chunker, embedding store, and answer
//! composer into two calls:
//!
//! ```text
//! build_index(document) : extract → split → embed (batched) → bulk insert
//! ask(index, query)     : embed question → top-k → compose → complete → trim
//! ```
//!
//! The pipeline owns no global state: the caller constructs it from a
//! [`Config`] and the provider objects, and owns every index it builds.
//! Each external call gets its own deadline: embedding calls (one per batch
//! during a build, one per question) use `index.embed_timeout`, completion
//! calls use `service_timeout`. Exceeding either yields
//! [`RagError::ServiceTimeout`]. A provider's HTTP retries run inside that
//! deadline, so they are cut short once it passes. There is no retry at
//! this level.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chunk;
use crate::compose;
use crate::completion::CompletionProvider;
use crate::config::Config;
use crate::embedding::{embed_query, EmbeddingProvider};
use crate::error::{RagError, RagResult};
use crate::extract;
use crate::index::{DocumentIndex, IndexOptions};
use crate::models::{Answer, Document, Query};

/// Default bound on each external call.
pub const DEFAULT_SERVICE_TIMEOUT: Duration = Duration::from_secs(30);

/// Chunking and retrieval parameters, decoupled from application config.
#[derive(Debug, Clone)]
pub struct PipelineParams {
    pub chunk_size: usize,
    pub overlap: usize,
    pub top_k: usize,
    pub similarity_floor: Option<f32>,
    /// Deadline for each completion call.
    pub service_timeout: Duration,
    /// Recent messages a [`DocumentSession`](crate::session::DocumentSession) passes along.
    pub history_window: usize,
    pub index: IndexOptions,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            chunk_size: chunk::DEFAULT_CHUNK_SIZE,
            overlap: chunk::DEFAULT_OVERLAP,
            top_k: 3,
            similarity_floor: None,
            service_timeout: DEFAULT_SERVICE_TIMEOUT,
            history_window: 5,
            index: IndexOptions::default(),
        }
    }
}

impl PipelineParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            overlap: config.chunking.overlap,
            top_k: config.retrieval.top_k,
            similarity_floor: config.retrieval.similarity_floor,
            service_timeout: Duration::from_secs(config.completion.timeout_secs),
            history_window: config.session.history_window,
            index: IndexOptions::from_config(&config.session, &config.embedding),
        }
    }
}

/// Document question-answering pipeline.
pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    completer: Arc<dyn CompletionProvider>,
    params: PipelineParams,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        completer: Arc<dyn CompletionProvider>,
        params: PipelineParams,
    ) -> RagResult<Self> {
        chunk::validate(params.chunk_size, params.overlap)?;
        if params.top_k == 0 {
            return Err(RagError::InvalidConfig("top_k must be >= 1".to_string()));
        }
        Ok(Self {
            embedder,
            completer,
            params,
        })
    }

    /// Build a pipeline from configuration, creating both providers.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = crate::embedding::create_provider(&config.embedding)?;
        let completer = crate::completion::create_completion_provider(&config.completion)?;
        Ok(Self::new(
            embedder,
            completer,
            PipelineParams::from_config(config),
        )?)
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn completer(&self) -> &Arc<dyn CompletionProvider> {
        &self.completer
    }

    /// Extract, chunk, and index an uploaded document.
    ///
    /// # Errors
    ///
    /// - [`RagError::Extraction`] for unreadable or unsupported documents.
    /// - [`RagError::EmptyDocument`] when no text survives extraction.
    /// - [`RagError::EmbeddingService`] / [`RagError::ServiceTimeout`] when
    ///   embedding fails; no index is left behind.
    pub async fn build_index(&self, document: Document) -> RagResult<DocumentIndex> {
        let started = Instant::now();
        let text = extract::extract(&document)?;
        tracing::info!(
            document = %document.filename,
            chars = text.chars().count(),
            "document extracted"
        );
        // The blob is not retained past extraction.
        let Document {
            id: document_id,
            filename,
            ..
        } = document;
        self.build_index_from_text(&document_id, &filename, &text)
            .await
            .map(|index| {
                tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "build finished");
                index
            })
    }

    /// Chunk and index already-extracted text.
    pub async fn build_index_from_text(
        &self,
        document_id: &str,
        label: &str,
        text: &str,
    ) -> RagResult<DocumentIndex> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyDocument(label.to_string()));
        }
        let chunks = chunk::split(document_id, text, self.params.chunk_size, self.params.overlap)?;
        DocumentIndex::build(document_id, chunks, self.embedder.as_ref(), &self.params.index).await
    }

    /// Answer `query` from `index`.
    ///
    /// # Errors
    ///
    /// - [`RagError::Search`] when the index was released or built with a
    ///   different embedding model.
    /// - [`RagError::EmbeddingService`] / [`RagError::CompletionService`] /
    ///   [`RagError::ServiceTimeout`] when an external call fails.
    pub async fn ask(&self, index: &DocumentIndex, query: &Query) -> RagResult<Answer> {
        index.check_queryable(self.embedder.as_ref())?;

        let retrieval_start = Instant::now();
        let query_vec = with_timeout(
            "embedding service",
            self.params.index.embed_timeout,
            embed_query(self.embedder.as_ref(), &query.question),
        )
        .await?;
        let sources = index
            .search_vector(&query_vec, self.params.top_k, self.params.similarity_floor)
            .await?;
        let retrieval_ms = retrieval_start.elapsed().as_millis() as u64;

        if sources.is_empty() {
            tracing::warn!(index = %index.id(), "no chunk retrieved; answering with empty context");
        }

        let chunks: Vec<_> = sources.iter().map(|s| s.chunk.clone()).collect();
        let prompt = compose::compose(&query.question, &chunks, &query.history);

        let generation_start = Instant::now();
        let raw = with_timeout(
            "completion service",
            self.params.service_timeout,
            self.completer.complete(&prompt),
        )
        .await?;
        tracing::info!(
            index = %index.id(),
            retrieved = sources.len(),
            retrieval_ms,
            generation_ms = generation_start.elapsed().as_millis() as u64,
            "question answered"
        );

        Ok(Answer {
            text: raw.trim().to_string(),
            sources,
        })
    }

    /// Answer a bare question with no history, returning only the text.
    pub async fn ask_text(&self, index: &DocumentIndex, question: &str) -> RagResult<String> {
        Ok(self.ask(index, &Query::new(question)).await?.text)
    }
}

/// Await `fut`, failing with [`RagError::ServiceTimeout`] after `limit`.
pub async fn with_timeout<T, F>(service: &'static str, limit: Duration, fut: F) -> RagResult<T>
where
    F: Future<Output = RagResult<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(RagError::ServiceTimeout {
            service,
            timeout: limit,
        }),
    }
}
