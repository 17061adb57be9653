//! Core data models used throughout the pipeline.
//!
//! These types represent the uploaded document, its chunks, and the
//! embedded records and search results that flow from upload to answer.

use serde::{Deserialize, Serialize};

/// An uploaded document: raw bytes plus the name it was uploaded under.
///
/// Consumed once by the extractor and dropped after indexing.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Document {
    /// Wrap an uploaded blob, assigning a fresh document id.
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.into(),
            content_type: None,
            bytes,
        }
    }

    /// Attach the MIME type reported by the upload layer.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// A bounded window of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    pub document_id: String,
    /// Position of the chunk within its document, contiguous from 0.
    pub index: usize,
    /// Character offset of the first character in the source text.
    pub start: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk paired with its embedding vector.
#[derive(Debug, Clone)]
pub struct EmbeddingRecord {
    pub chunk: TextChunk,
    pub vector: Vec<f32>,
}

/// A chunk returned from similarity search with its cosine score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// One turn of the recent conversation passed alongside a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A question plus optional recent history. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub question: String,
    pub history: Vec<ChatMessage>,
}

impl Query {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }
}

/// The answer to a [`Query`] together with the chunks it was grounded on.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<ScoredChunk>,
}
