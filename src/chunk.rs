//! Sliding-window text chunker.
//!
//! Splits extracted document text into [`TextChunk`]s of at most
//! `chunk_size` characters, where each window starts `chunk_size - overlap`
//! characters after the previous one so that context spanning a window
//! boundary appears in both neighbours.
//!
//! Sizes are counted in Unicode scalar values, not bytes: Telugu and
//! Devanagari text is multi-byte in UTF-8 and a window never splits a
//! code point.
//!
//! # Example
//!
//! ```rust
//! use sahayak_rag::chunk::split;
//!
//! let chunks = split("doc-1", "abcdefghij", 4, 1).unwrap();
//! let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
//! assert_eq!(texts, ["abcd", "defg", "ghij"]);
//! ```

use sha2::{Digest, Sha256};

use crate::error::{RagError, RagResult};
use crate::models::TextChunk;

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive windows in characters.
pub const DEFAULT_OVERLAP: usize = 200;

/// Split `text` into overlapping windows.
///
/// # Guarantees
///
/// - Every chunk holds at most `chunk_size` characters.
/// - Consecutive chunks share exactly `overlap` characters.
/// - Indices are contiguous: `0, 1, 2, …, N-1`.
/// - Empty text yields no chunks.
///
/// # Errors
///
/// [`RagError::InvalidConfig`] unless `chunk_size > 0` and `overlap < chunk_size`.
pub fn split(
    document_id: &str,
    text: &str,
    chunk_size: usize,
    overlap: usize,
) -> RagResult<Vec<TextChunk>> {
    validate(chunk_size, overlap)?;

    // Byte offset of every char, plus the end of the string.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    let char_count = bounds.len();
    bounds.push(text.len());

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < char_count {
        let end = (start + chunk_size).min(char_count);
        let piece = &text[bounds[start]..bounds[end]];
        chunks.push(make_chunk(document_id, chunks.len(), start, piece));
        if end == char_count {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

/// Rebuild the source text from chunks produced by [`split`] with the same
/// `overlap`, dropping the shared prefix of every chunk after the first.
pub fn reassemble(chunks: &[TextChunk], overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&chunk.text);
        } else {
            out.extend(chunk.text.chars().skip(overlap));
        }
    }
    out
}

/// Check the chunker preconditions.
pub fn validate(chunk_size: usize, overlap: usize) -> RagResult<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidConfig(
            "chunk_size must be > 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(RagError::InvalidConfig(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

fn make_chunk(document_id: &str, index: usize, start: usize, text: &str) -> TextChunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    TextChunk {
        document_id: document_id.to_string(),
        index,
        start,
        text: text.to_string(),
        hash,
    }
}
