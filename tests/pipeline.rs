//! End-to-end tests for index building and grounded question answering.
//!
//! Embeddings come from the offline hashing provider and completions from
//! in-process stubs, so these tests need no network.

use async_trait::async_trait;
use sahayak_rag::chunk;
use sahayak_rag::completion::CompletionProvider;
use sahayak_rag::config::IndexBackend;
use sahayak_rag::embedding::{EmbeddingProvider, HashingProvider};
use sahayak_rag::index::{DocumentIndex, IndexOptions, IndexState};
use sahayak_rag::models::Query;
use sahayak_rag::pipeline::{PipelineParams, RagPipeline};
use sahayak_rag::session::DocumentSession;
use sahayak_rag::RagError;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ─── Stub completion providers ──────────────────────────────────────

/// Answers with the context sentence sharing the most words with the
/// question, and records every prompt it sees. Questions containing
/// "FAIL" are rejected.
#[derive(Default)]
struct ExtractiveCompletion {
    prompts: Mutex<Vec<String>>,
}

impl ExtractiveCompletion {
    fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

fn section<'a>(prompt: &'a str, start: &str, ends: &[&str]) -> &'a str {
    let from = prompt.find(start).map(|i| i + start.len()).unwrap_or(0);
    let rest = &prompt[from..];
    let to = ends
        .iter()
        .filter_map(|e| rest.find(e))
        .min()
        .unwrap_or(rest.len());
    &rest[..to]
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

#[async_trait]
impl CompletionProvider for ExtractiveCompletion {
    fn model_name(&self) -> &str {
        "extractive-stub"
    }

    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let context = section(prompt, "Context:\n", &["\n\nRecent conversation:", "\n\nQuestion:"]);
        let question = section(prompt, "Question:\n", &["\n\nAnswer:"]);
        if question.contains("FAIL") {
            return Err(RagError::CompletionService("stub refused".to_string()));
        }
        let asked = words(question);
        let best = context
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .max_by_key(|s| words(s).iter().filter(|w| asked.contains(w)).count());
        Ok(format!(
            "  {}.  ",
            best.unwrap_or("The document does not cover this")
        ))
    }
}

struct SlowCompletion;

#[async_trait]
impl CompletionProvider for SlowCompletion {
    fn model_name(&self) -> &str {
        "slow-stub"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, RagError> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok("too late".to_string())
    }
}

/// Hashing embedder that fails on the given (1-based) call.
struct FlakyEmbedder {
    inner: HashingProvider,
    calls: AtomicUsize,
    fail_on: usize,
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
    fn dims(&self) -> usize {
        self.inner.dims()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(RagError::EmbeddingService("upstream returned 503".to_string()));
        }
        self.inner.embed(texts).await
    }
}

/// Hashing embedder that takes `delay` per call and counts its calls.
struct PacedEmbedder {
    inner: HashingProvider,
    calls: AtomicUsize,
    delay: Duration,
}

#[async_trait]
impl EmbeddingProvider for PacedEmbedder {
    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
    fn dims(&self) -> usize {
        self.inner.dims()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.embed(texts).await
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn params(temp_root: &Path) -> PipelineParams {
    PipelineParams {
        index: IndexOptions {
            backend: IndexBackend::Sqlite,
            batch_size: 4,
            temp_root: Some(temp_root.to_path_buf()),
            ..IndexOptions::default()
        },
        ..PipelineParams::default()
    }
}

fn pipeline_with(
    completer: Arc<dyn CompletionProvider>,
    params: PipelineParams,
) -> RagPipeline {
    RagPipeline::new(Arc::new(HashingProvider::default()), completer, params).unwrap()
}

/// Sentences padded to exactly `width` characters so each becomes one chunk.
fn padded(sentences: &[&str], width: usize) -> String {
    sentences
        .iter()
        .map(|s| format!("{:<width$}", s, width = width))
        .collect()
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

const LESSON: &str = "Photosynthesis happens in the leaves of green plants. \
    Chlorophyll absorbs sunlight and gives leaves their colour. \
    Roots take up water from the soil. \
    Plants release oxygen into the air during the day. \
    Carbon dioxide enters the leaf through tiny pores called stomata. \
    The food made in the leaves is stored as starch. ";

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn answers_from_the_uploaded_document() {
    let tmp = TempDir::new().unwrap();
    let completer = Arc::new(ExtractiveCompletion::default());
    let pipeline = pipeline_with(completer.clone(), params(tmp.path()));

    let index = pipeline
        .build_index_from_text(
            "geo",
            "capitals.pdf",
            "The capital of France is Paris. The capital of Japan is Tokyo.",
        )
        .await
        .unwrap();
    assert_eq!(index.chunk_count(), 1);

    let answer = pipeline
        .ask(&index, &Query::new("What is the capital of Japan?"))
        .await
        .unwrap();
    assert!(answer.text.contains("Tokyo"), "answer was {:?}", answer.text);
    assert_eq!(answer.text, answer.text.trim());
    assert_eq!(answer.sources.len(), 1);

    let prompts = completer.prompts();
    let prompt = &prompts[0];
    assert!(prompt.contains("The capital of Japan is Tokyo."));
    assert!(prompt.contains("Question:\nWhat is the capital of Japan?"));

    index.release().await.unwrap();
}

#[tokio::test]
async fn whitespace_only_document_is_empty() {
    let tmp = TempDir::new().unwrap();
    let pipeline = pipeline_with(Arc::new(ExtractiveCompletion::default()), params(tmp.path()));
    let err = pipeline
        .build_index_from_text("doc", "scanned.pdf", " \n\t \n")
        .await
        .unwrap_err();
    assert!(err.is_empty_document());
    assert!(!err.is_retryable());
    assert_eq!(entries(tmp.path()), 0);
}

#[tokio::test]
async fn asking_a_released_index_fails() {
    let tmp = TempDir::new().unwrap();
    let pipeline = pipeline_with(Arc::new(ExtractiveCompletion::default()), params(tmp.path()));
    let index = pipeline
        .build_index_from_text("doc", "lesson.pdf", LESSON)
        .await
        .unwrap();
    let storage = index.storage_path().unwrap();
    assert!(storage.starts_with(tmp.path()));

    index.release().await.unwrap();
    assert_eq!(index.state(), IndexState::Released);
    assert!(!storage.exists());

    let err = pipeline
        .ask(&index, &Query::new("What do roots take up?"))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Search(_)));
}

#[tokio::test]
async fn retrieval_returns_at_most_k_chunks_from_the_index() {
    let tmp = TempDir::new().unwrap();
    let params = PipelineParams {
        chunk_size: 60,
        overlap: 15,
        top_k: 3,
        ..params(tmp.path())
    };
    let pipeline = pipeline_with(Arc::new(ExtractiveCompletion::default()), params);
    let index = pipeline
        .build_index_from_text("doc", "lesson.pdf", LESSON)
        .await
        .unwrap();
    let all = chunk::split("doc", LESSON, 60, 15).unwrap();
    assert_eq!(index.chunk_count(), all.len());
    assert!(all.len() > 3);

    for question in ["Where is starch stored?", "What are stomata?", "zzz"] {
        let answer = pipeline.ask(&index, &Query::new(question)).await.unwrap();
        assert!(answer.sources.len() <= 3);
        for source in &answer.sources {
            assert!(all.contains(&source.chunk), "unknown chunk {:?}", source.chunk);
        }
        let scores: Vec<f32> = answer.sources.iter().map(|s| s.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
    }
}

#[tokio::test]
async fn single_distinctive_chunk_is_found_with_k_one() {
    let sentences = [
        "Rivers carry silt down to the delta.",
        "Volcanoes erupt molten lava and ash.",
        "Monsoon winds bring heavy rain in June.",
        "Deserts receive very little rainfall.",
    ];
    let text = padded(&sentences, 50);
    let embedder = HashingProvider::default();
    let chunks = chunk::split("geo", &text, 50, 0).unwrap();
    assert_eq!(chunks.len(), sentences.len());

    let options = IndexOptions {
        backend: IndexBackend::Memory,
        ..IndexOptions::default()
    };
    let index = DocumentIndex::build("geo", chunks, &embedder, &options)
        .await
        .unwrap();
    let hits = index.query(&embedder, sentences[1], 1).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].index, 1);
    assert_eq!(hits[0].text.trim(), sentences[1]);
}

#[tokio::test]
async fn identical_builds_rank_identically() {
    let tmp = TempDir::new().unwrap();
    let params = PipelineParams {
        chunk_size: 80,
        overlap: 20,
        top_k: 4,
        ..params(tmp.path())
    };
    let pipeline = pipeline_with(Arc::new(ExtractiveCompletion::default()), params);
    let first = pipeline
        .build_index_from_text("a", "lesson.pdf", LESSON)
        .await
        .unwrap();
    let second = pipeline
        .build_index_from_text("a", "lesson.pdf", LESSON)
        .await
        .unwrap();
    assert_ne!(first.id(), second.id());

    let embedder = pipeline.embedder().as_ref();
    for question in ["How does chlorophyll help?", "oxygen during the day"] {
        let a = first.search(embedder, question, 4, None).await.unwrap();
        let b = second.search(embedder, question, 4, None).await.unwrap();
        let a: Vec<(usize, f32)> = a.iter().map(|s| (s.chunk.index, s.score)).collect();
        let b: Vec<(usize, f32)> = b.iter().map(|s| (s.chunk.index, s.score)).collect();
        assert_eq!(a, b);
    }
}

#[tokio::test]
async fn slow_completion_times_out() {
    let tmp = TempDir::new().unwrap();
    let builder = pipeline_with(Arc::new(ExtractiveCompletion::default()), params(tmp.path()));
    let index = builder
        .build_index_from_text("doc", "lesson.pdf", LESSON)
        .await
        .unwrap();

    let params = PipelineParams {
        service_timeout: Duration::from_millis(50),
        ..params(tmp.path())
    };
    let pipeline = pipeline_with(Arc::new(SlowCompletion), params);
    let err = pipeline
        .ask(&index, &Query::new("What is stored as starch?"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagError::ServiceTimeout {
            service: "completion service",
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(index.state(), IndexState::Ready);
}

#[tokio::test]
async fn embedding_deadline_applies_per_batch() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(PacedEmbedder {
        inner: HashingProvider::default(),
        calls: AtomicUsize::new(0),
        delay: Duration::from_millis(40),
    });
    let params = PipelineParams {
        chunk_size: 40,
        overlap: 10,
        index: IndexOptions {
            batch_size: 1,
            embed_timeout: Duration::from_millis(150),
            ..params(tmp.path()).index
        },
        ..params(tmp.path())
    };
    let pipeline =
        RagPipeline::new(embedder.clone(), Arc::new(ExtractiveCompletion::default()), params)
            .unwrap();

    let chunks = chunk::split("doc", LESSON, 40, 10).unwrap();
    assert!(chunks.len() >= 10, "only {} chunks", chunks.len());

    let index = pipeline
        .build_index_from_text("doc", "lesson.pdf", LESSON)
        .await
        .unwrap();
    assert_eq!(index.chunk_count(), chunks.len());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), chunks.len());
    index.release().await.unwrap();
}

#[tokio::test]
async fn slow_embedding_batch_times_out_and_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(PacedEmbedder {
        inner: HashingProvider::default(),
        calls: AtomicUsize::new(0),
        delay: Duration::from_secs(10),
    });
    let params = PipelineParams {
        index: IndexOptions {
            embed_timeout: Duration::from_millis(50),
            ..params(tmp.path()).index
        },
        ..params(tmp.path())
    };
    let pipeline =
        RagPipeline::new(embedder, Arc::new(ExtractiveCompletion::default()), params).unwrap();

    let err = pipeline
        .build_index_from_text("doc", "lesson.pdf", LESSON)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagError::ServiceTimeout {
            service: "embedding service",
            ..
        }
    ));
    assert_eq!(entries(tmp.path()), 0);
}

#[tokio::test]
async fn nothing_above_floor_still_asks_with_empty_context() {
    let tmp = TempDir::new().unwrap();
    let completer = Arc::new(ExtractiveCompletion::default());
    let params = PipelineParams {
        similarity_floor: Some(0.99),
        ..params(tmp.path())
    };
    let pipeline = pipeline_with(completer.clone(), params);
    let index = pipeline
        .build_index_from_text("doc", "lesson.pdf", LESSON)
        .await
        .unwrap();

    let answer = pipeline
        .ask(&index, &Query::new("Who won the cricket match yesterday?"))
        .await
        .unwrap();
    assert!(answer.sources.is_empty());
    assert_eq!(answer.text, "The document does not cover this.");

    let prompts = completer.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Context:\n\n\nQuestion:\nWho won the cricket match yesterday?"));

    index.release().await.unwrap();
}

#[tokio::test]
async fn failed_embedding_batch_leaves_no_index() {
    let tmp = TempDir::new().unwrap();
    let embedder = Arc::new(FlakyEmbedder {
        inner: HashingProvider::default(),
        calls: AtomicUsize::new(0),
        fail_on: 2,
    });
    let params = PipelineParams {
        chunk_size: 40,
        overlap: 10,
        index: IndexOptions {
            backend: IndexBackend::Sqlite,
            batch_size: 1,
            temp_root: Some(tmp.path().to_path_buf()),
            ..IndexOptions::default()
        },
        ..PipelineParams::default()
    };
    let pipeline =
        RagPipeline::new(embedder.clone(), Arc::new(ExtractiveCompletion::default()), params)
            .unwrap();

    let err = pipeline
        .build_index_from_text("doc", "lesson.pdf", LESSON)
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmbeddingService(_)));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    assert_eq!(entries(tmp.path()), 0);
}

#[tokio::test]
async fn session_passes_recent_history_and_skips_failures() {
    let tmp = TempDir::new().unwrap();
    let completer = Arc::new(ExtractiveCompletion::default());
    let pipeline = Arc::new(pipeline_with(completer.clone(), params(tmp.path())));
    let index = pipeline
        .build_index_from_text("doc", "lesson.pdf", LESSON)
        .await
        .unwrap();
    let storage = index.storage_path().unwrap();
    let mut session = DocumentSession::from_index(pipeline, index, "lesson.pdf".to_string());

    let first = session.ask("What do roots take up?").await.unwrap();
    assert!(first.text.contains("water"), "answer was {:?}", first.text);
    assert_eq!(session.history().len(), 2);

    let err = session.ask("FAIL on purpose").await.unwrap_err();
    assert!(matches!(err, RagError::CompletionService(_)));
    assert_eq!(session.history().len(), 2);

    session.ask("And what do plants release?").await.unwrap();
    assert_eq!(session.history().len(), 4);

    let prompts = completer.prompts();
    assert!(!prompts[0].contains("Recent conversation"));
    let last = prompts.last().unwrap();
    assert!(last.contains("Recent conversation:\nUser: What do roots take up?"));
    assert!(!last.contains("FAIL on purpose"));

    session.close().await.unwrap();
    assert!(!storage.exists());
}
