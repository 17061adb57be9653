//! The tutor: a teacher-facing assistant that routes each message to one
//! explicit capability.
//!
//! ```text
//! message ──► Router::route ──► Capability ──► Tutor::dispatch ──► reply
//!                                   │
//!       Search ─────────────────────┼──► WebSearch (Serper)
//!       Calculate ──────────────────┼──► calc::evaluate
//!       Summarize / GenerateStory ──┼──► CompletionProvider
//!       RetrieveFromDocument ───────┴──► DocumentSession::ask
//! ```
//!
//! Routing is rule-based and deterministic; the language model is only
//! consulted after a capability has been chosen.

pub mod calc;
pub mod search;

use std::sync::Arc;
use std::time::Duration;

use crate::completion::CompletionProvider;
use crate::error::{RagError, RagResult};
use crate::language;
use crate::pipeline::{with_timeout, DEFAULT_SERVICE_TIMEOUT};
use crate::session::DocumentSession;

pub use search::{DisabledSearch, SerperSearch, WebSearch};

/// What the tutor will do with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Search { query: String },
    Calculate { expression: String },
    Summarize { text: String },
    RetrieveFromDocument { question: String },
    GenerateStory { topic: String },
}

impl Capability {
    pub fn name(&self) -> &'static str {
        match self {
            Capability::Search { .. } => "search",
            Capability::Calculate { .. } => "calculate",
            Capability::Summarize { .. } => "summarize",
            Capability::RetrieveFromDocument { .. } => "document",
            Capability::GenerateStory { .. } => "story",
        }
    }
}

/// Rule-based capability selection.
///
/// In order: an explicit `/search`, `/calc`, `/summarize`, `/doc` or
/// `/story` prefix; a bare arithmetic expression; the words
/// "summarize"/"summary"; the word "story"; any other message goes to the
/// attached document if there is one, and to web search otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct Router {
    document_attached: bool,
}

impl Router {
    pub fn new(document_attached: bool) -> Self {
        Self { document_attached }
    }

    pub fn route(&self, input: &str) -> Capability {
        let input = input.trim();

        if let Some((command, rest)) = split_command(input) {
            let rest = rest.to_string();
            match command {
                "search" => return Capability::Search { query: rest },
                "calc" => return Capability::Calculate { expression: rest },
                "summarize" => return Capability::Summarize { text: rest },
                "doc" => return Capability::RetrieveFromDocument { question: rest },
                "story" => return Capability::GenerateStory { topic: rest },
                _ => {}
            }
        }

        if calc::looks_like_expression(input) {
            return Capability::Calculate {
                expression: input.to_string(),
            };
        }
        if has_word(input, &["summarize", "summarise", "summary"]) {
            return Capability::Summarize {
                text: strip_lead_word(input, &["summarize", "summarise", "summary"]),
            };
        }
        if has_word(input, &["story", "katha", "kahani"]) {
            return Capability::GenerateStory {
                topic: story_topic(input),
            };
        }
        if self.document_attached {
            Capability::RetrieveFromDocument {
                question: input.to_string(),
            }
        } else {
            Capability::Search {
                query: input.to_string(),
            }
        }
    }
}

fn split_command(input: &str) -> Option<(&str, &str)> {
    let rest = input.strip_prefix('/')?;
    let (command, body) = match rest.find(char::is_whitespace) {
        Some(pos) => (&rest[..pos], &rest[pos..]),
        None => (rest, ""),
    };
    Some((command, body.trim()))
}

fn words(input: &str) -> impl Iterator<Item = String> + '_ {
    input
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

fn has_word(input: &str, needles: &[&str]) -> bool {
    words(input).any(|w| needles.contains(&w.as_str()))
}

/// Drop a leading keyword and its separator ("Summarize: ...").
fn strip_lead_word(input: &str, keywords: &[&str]) -> String {
    for keyword in keywords {
        let leads = input
            .get(..keyword.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(keyword));
        if !leads {
            continue;
        }
        let rest = input[keyword.len()..]
            .trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace());
        if !rest.is_empty() {
            return rest.to_string();
        }
    }
    input.to_string()
}

/// Byte offset of ASCII `needle` in `haystack`, ignoring ASCII case.
fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack.char_indices().map(|(i, _)| i).find(|&i| {
        haystack
            .get(i..i + needle.len())
            .is_some_and(|window| window.eq_ignore_ascii_case(needle))
    })
}

/// "Tell a story about honesty" → "honesty".
fn story_topic(input: &str) -> String {
    for marker in [" about ", " on "] {
        if let Some(pos) = find_ascii_ci(input, marker) {
            let rest = &input[pos + marker.len()..];
            let topic = rest
                .trim()
                .trim_end_matches(|c: char| c == '.' || c == '?' || c == '!');
            if !topic.is_empty() {
                return topic.to_string();
            }
        }
    }
    input.to_string()
}

/// Prompt for a teacher-facing summary.
pub fn summary_prompt(text: &str) -> String {
    format!(
        "You are Sahayak, an assistant for school teachers.\n\
         Summarize this for school teachers in simple language. \
         Keep the key facts and drop the rest.\n{}\n\nText:\n{}\n\nSummary:",
        language::detect(text).instruction(),
        text.trim()
    )
}

/// Prompt for a short moral story for Indian school children.
pub fn story_prompt(topic: &str) -> String {
    format!(
        "You are Sahayak, an assistant for school teachers.\n\
         Write a short, engaging story for school children in India about: {}\n\
         Keep it age-appropriate, use familiar Indian names and settings, \
         and end with a one-line moral.\n{}\n\nStory:",
        topic.trim(),
        language::detect(topic).instruction()
    )
}

/// Conversational front end over the tutor's capabilities.
pub struct Tutor {
    completer: Arc<dyn CompletionProvider>,
    web: Box<dyn WebSearch>,
    session: Option<DocumentSession>,
    service_timeout: Duration,
}

impl Tutor {
    pub fn new(completer: Arc<dyn CompletionProvider>, web: Box<dyn WebSearch>) -> Self {
        Self {
            completer,
            web,
            session: None,
            service_timeout: DEFAULT_SERVICE_TIMEOUT,
        }
    }

    pub fn with_service_timeout(mut self, timeout: Duration) -> Self {
        self.service_timeout = timeout;
        self
    }

    /// Attach a document session, returning the one it replaces.
    pub fn attach(&mut self, session: DocumentSession) -> Option<DocumentSession> {
        self.session.replace(session)
    }

    pub fn detach(&mut self) -> Option<DocumentSession> {
        self.session.take()
    }

    pub fn session(&self) -> Option<&DocumentSession> {
        self.session.as_ref()
    }

    pub fn route(&self, input: &str) -> Capability {
        Router::new(self.session.is_some()).route(input)
    }

    /// Route `input` and run the chosen capability.
    pub async fn respond(&mut self, input: &str) -> RagResult<String> {
        let capability = self.route(input);
        tracing::info!(capability = capability.name(), "routed message");
        self.dispatch(capability).await
    }

    pub async fn dispatch(&mut self, capability: Capability) -> RagResult<String> {
        match capability {
            Capability::Search { query } => {
                require("search query", &query)?;
                with_timeout(
                    "search service",
                    self.service_timeout,
                    self.web.search(&query),
                )
                .await
            }
            Capability::Calculate { expression } => {
                let value = calc::evaluate(&expression)?;
                Ok(calc::format_value(value))
            }
            Capability::Summarize { text } => {
                require("text to summarize", &text)?;
                self.generate(&summary_prompt(&text)).await
            }
            Capability::GenerateStory { topic } => {
                require("story topic", &topic)?;
                self.generate(&story_prompt(&topic)).await
            }
            Capability::RetrieveFromDocument { question } => {
                require("question", &question)?;
                let session = self.session.as_mut().ok_or_else(|| {
                    RagError::InvalidInput("no document is attached; upload a PDF first".to_string())
                })?;
                Ok(session.ask(&question).await?.text)
            }
        }
    }

    async fn generate(&self, prompt: &str) -> RagResult<String> {
        let text = with_timeout(
            "completion service",
            self.service_timeout,
            self.completer.complete(prompt),
        )
        .await?;
        Ok(text.trim().to_string())
    }

    /// Release the attached document, if any.
    pub async fn close(mut self) -> RagResult<()> {
        match self.session.take() {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    }
}

fn require(what: &str, value: &str) -> RagResult<()> {
    if value.trim().is_empty() {
        return Err(RagError::InvalidInput(format!("missing {}", what)));
    }
    Ok(())
}
