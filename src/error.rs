//! Error kinds surfaced by the document Q&A pipeline.
//!
//! The pipeline distinguishes "nothing to search" ([`RagError::EmptyDocument`])
//! from "search succeeded but a service failed" so the caller can decide
//! between asking the user to re-upload and simply retrying the question.
//!
//! Configuration loading and the CLI use `anyhow` instead; this enum is only
//! for the library operations that callers are expected to match on.

use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the pipeline.
pub type RagResult<T> = std::result::Result<T, RagError>;

/// Failure of a pipeline operation.
#[derive(Debug, Error)]
pub enum RagError {
    /// The document could not be read as a supported format.
    #[error("document extraction failed: {0}")]
    Extraction(String),

    /// Extraction succeeded but produced no text worth indexing.
    #[error("document '{0}' contains no extractable text")]
    EmptyDocument(String),

    /// The embedding service failed; the index build was aborted.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// The index is missing, released, or unreadable at query time.
    #[error("search failed: {0}")]
    Search(String),

    /// The web search provider failed or could not be reached.
    #[error("web search error: {0}")]
    WebSearch(String),

    /// The language-model completion call failed.
    #[error("completion service error: {0}")]
    CompletionService(String),

    /// An external call exceeded its deadline.
    #[error("{service} did not respond within {}s", timeout.as_secs())]
    ServiceTimeout {
        service: &'static str,
        timeout: Duration,
    },

    /// Backend storage failed while building an index.
    #[error("index storage error: {0}")]
    Storage(String),

    /// A parameter violated its precondition (chunk sizes, `k`, provider name).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// User input could not be handled (e.g. a malformed arithmetic expression).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl RagError {
    /// True when the failure means "there is nothing to search".
    pub fn is_empty_document(&self) -> bool {
        matches!(self, RagError::EmptyDocument(_))
    }

    /// True for failures dominated by transient network conditions,
    /// where re-running the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingService(_)
                | RagError::CompletionService(_)
                | RagError::WebSearch(_)
                | RagError::ServiceTimeout { .. }
        )
    }
}

impl From<sqlx::Error> for RagError {
    fn from(e: sqlx::Error) -> Self {
        RagError::Storage(e.to_string())
    }
}
