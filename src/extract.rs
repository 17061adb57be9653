//! Text extraction for uploaded documents.
//!
//! Only page-oriented PDF documents are supported. The text layer of every
//! page is concatenated in document order; scanned pages without a text
//! layer contribute nothing (there is no OCR fallback here).

use crate::error::{RagError, RagResult};
use crate::models::Document;

pub const MIME_PDF: &str = "application/pdf";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Document formats the extractor recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
}

/// Identify the format from the declared content type, the filename
/// extension, or the leading magic bytes, in that order.
pub fn detect_format(document: &Document) -> RagResult<DocumentFormat> {
    if let Some(ct) = document.content_type.as_deref() {
        return match ct {
            MIME_PDF => Ok(DocumentFormat::Pdf),
            other => Err(RagError::Extraction(format!(
                "unsupported content-type: {}",
                other
            ))),
        };
    }
    if document.filename.to_ascii_lowercase().ends_with(".pdf")
        || document.bytes.starts_with(PDF_MAGIC)
    {
        return Ok(DocumentFormat::Pdf);
    }
    Err(RagError::Extraction(format!(
        "unsupported document format: {}",
        document.filename
    )))
}

/// Extract plain text from a document.
///
/// Returns an empty string for a valid document without a text layer; the
/// caller decides whether that is an error.
pub fn extract(document: &Document) -> RagResult<String> {
    match detect_format(document)? {
        DocumentFormat::Pdf => extract_pdf(&document.bytes),
    }
}

fn extract_pdf(bytes: &[u8]) -> RagResult<String> {
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(RagError::Extraction(
            "PDF extraction failed: missing %PDF header".to_string(),
        ));
    }
    pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| RagError::Extraction(format!("PDF extraction failed: {}", e)))
}
