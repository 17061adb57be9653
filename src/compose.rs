//! Grounded prompt construction.
//!
//! The prompt restricts the model to the retrieved context and asks it to
//! mirror the register of the question. Chunks appear in retrieval order.

use crate::language::{self, LanguageHint};
use crate::models::{ChatMessage, TextChunk};

const SYSTEM_INSTRUCTION: &str = "\
You are Sahayak, a helpful assistant for school teachers. Answer the question using ONLY the context below.
Always:
- Respond in the same language as the question (Telugu, English, Hindi, or a mix of them).
- If the question uses English words to express Telugu (code-mixed), answer in that style.
- Be concise, accurate, and stay within the context.
- If the context does not contain the answer, say that the document does not cover it.";

/// Build the grounded prompt for `question`.
///
/// `history` is rendered oldest first; pass an empty slice for a
/// stand-alone question. An empty `chunks` slice yields an empty context
/// block and the model is left to say it cannot answer.
pub fn compose(question: &str, chunks: &[TextChunk], history: &[ChatMessage]) -> String {
    compose_with_hint(question, chunks, history, language::detect(question))
}

pub fn compose_with_hint(
    question: &str,
    chunks: &[TextChunk],
    history: &[ChatMessage],
    hint: LanguageHint,
) -> String {
    let context = chunks
        .iter()
        .map(|c| c.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut prompt = String::with_capacity(SYSTEM_INSTRUCTION.len() + context.len() + 256);
    prompt.push_str(SYSTEM_INSTRUCTION);
    prompt.push_str("\n\nLanguage: ");
    prompt.push_str(hint.instruction());
    prompt.push_str("\n\nContext:\n");
    prompt.push_str(&context);

    if !history.is_empty() {
        prompt.push_str("\n\nRecent conversation:\n");
        for message in history {
            prompt.push_str(message.role.label());
            prompt.push_str(": ");
            prompt.push_str(message.content.trim());
            prompt.push('\n');
        }
    }

    prompt.push_str("\n\nQuestion:\n");
    prompt.push_str(question.trim());
    prompt.push_str("\n\nAnswer:");
    prompt
}
