//! A teacher's conversation about one uploaded document.
//!
//! [`DocumentSession`] owns the [`DocumentIndex`] built for the upload and a
//! short window of the recent exchange, which is passed to the composer so
//! follow-up questions ("and what about the roots?") keep their referent.

use std::sync::Arc;

use crate::error::RagResult;
use crate::index::DocumentIndex;
use crate::models::{Answer, ChatMessage, Document, Query};
use crate::pipeline::RagPipeline;

pub struct DocumentSession {
    pipeline: Arc<RagPipeline>,
    index: DocumentIndex,
    filename: String,
    history: Vec<ChatMessage>,
    history_window: usize,
}

impl DocumentSession {
    /// Index `document` and start a session over it.
    pub async fn open(pipeline: Arc<RagPipeline>, document: Document) -> RagResult<Self> {
        let filename = document.filename.clone();
        let index = pipeline.build_index(document).await?;
        Ok(Self::from_index(pipeline, index, filename))
    }

    /// Start a session over an index the caller already built.
    pub fn from_index(pipeline: Arc<RagPipeline>, index: DocumentIndex, filename: String) -> Self {
        let history_window = pipeline.params().history_window;
        tracing::info!(document = %filename, chunks = index.chunk_count(), "session opened");
        Self {
            pipeline,
            index,
            filename,
            history: Vec::new(),
            history_window,
        }
    }

    /// Override how many recent messages accompany each question.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn index(&self) -> &DocumentIndex {
        &self.index
    }

    /// Every message exchanged so far, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Ask a question about the document.
    ///
    /// The exchange is appended to the history only when the pipeline
    /// returns an answer.
    pub async fn ask(&mut self, question: &str) -> RagResult<Answer> {
        let recent = self.recent_history().to_vec();
        let query = Query::new(question).with_history(recent);
        let answer = self.pipeline.ask(&self.index, &query).await?;

        self.history.push(ChatMessage::user(question));
        self.history.push(ChatMessage::assistant(answer.text.clone()));
        Ok(answer)
    }

    fn recent_history(&self) -> &[ChatMessage] {
        let start = self.history.len().saturating_sub(self.history_window);
        &self.history[start..]
    }

    /// Release the index and its storage.
    pub async fn close(self) -> RagResult<()> {
        self.index.release().await?;
        tracing::info!(document = %self.filename, messages = self.history.len(), "session closed");
        Ok(())
    }
}
