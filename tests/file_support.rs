//! PDF upload tests: extraction through to a question answered from the
//! document.

use async_trait::async_trait;
use sahayak_rag::completion::CompletionProvider;
use sahayak_rag::config::IndexBackend;
use sahayak_rag::embedding::HashingProvider;
use sahayak_rag::extract::{self, DocumentFormat, MIME_PDF};
use sahayak_rag::index::IndexOptions;
use sahayak_rag::models::Document;
use sahayak_rag::pipeline::{PipelineParams, RagPipeline};
use sahayak_rag::session::DocumentSession;
use sahayak_rag::RagError;
use std::sync::Arc;

/// Minimal single-page PDF showing `text` in Helvetica.
/// Builds body then xref with correct byte offsets so pdf-extract can parse it.
/// `text` must not contain parentheses or backslashes.
fn minimal_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 72 700 Td ({}) Tj ET", text);
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

/// Echoes the retrieved context back as the answer.
struct EchoContext;

#[async_trait]
impl CompletionProvider for EchoContext {
    fn model_name(&self) -> &str {
        "echo-context"
    }

    async fn complete(&self, prompt: &str) -> Result<String, RagError> {
        let start = prompt.find("Context:\n").map(|i| i + "Context:\n".len()).unwrap_or(0);
        let rest = &prompt[start..];
        let end = rest.find("\n\nQuestion:").unwrap_or(rest.len());
        Ok(rest[..end].to_string())
    }
}

fn pipeline() -> Arc<RagPipeline> {
    let params = PipelineParams {
        index: IndexOptions {
            backend: IndexBackend::Memory,
            ..IndexOptions::default()
        },
        ..PipelineParams::default()
    };
    Arc::new(
        RagPipeline::new(
            Arc::new(HashingProvider::default()),
            Arc::new(EchoContext),
            params,
        )
        .unwrap(),
    )
}

#[test]
fn pdf_text_layer_is_extracted() {
    let doc = Document::new("lesson.pdf", minimal_pdf("The capital of Japan is Tokyo"));
    assert_eq!(extract::detect_format(&doc).unwrap(), DocumentFormat::Pdf);
    let text = extract::extract(&doc).unwrap();
    assert!(text.contains("Tokyo"), "extracted: {:?}", text);
}

#[test]
fn declared_content_type_overrides_extension() {
    let doc = Document::new("upload.bin", minimal_pdf("rivers")).with_content_type(MIME_PDF);
    assert_eq!(extract::detect_format(&doc).unwrap(), DocumentFormat::Pdf);
}

#[test]
fn corrupt_pdf_is_an_extraction_error() {
    let doc = Document::new("bad.pdf", b"not a valid pdf".to_vec());
    assert!(matches!(
        extract::extract(&doc),
        Err(RagError::Extraction(_))
    ));
}

#[tokio::test]
async fn uploaded_pdf_answers_questions() {
    let doc = Document::new("lesson.pdf", minimal_pdf("The capital of Japan is Tokyo"));
    let mut session = DocumentSession::open(pipeline(), doc).await.unwrap();
    assert_eq!(session.filename(), "lesson.pdf");
    assert_eq!(session.index().chunk_count(), 1);

    let answer = session.ask("What is the capital of Japan?").await.unwrap();
    assert!(answer.text.contains("Tokyo"), "answer: {:?}", answer.text);
    session.close().await.unwrap();
}

#[tokio::test]
async fn unsupported_upload_never_builds_an_index() {
    let doc = Document::new("notes.txt", b"plain notes".to_vec());
    let err = DocumentSession::open(pipeline(), doc).await.err().unwrap();
    assert!(matches!(err, RagError::Extraction(_)));
}
