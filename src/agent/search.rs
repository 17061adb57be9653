//! Web search for the tutor's `Search` capability.

use anyhow::Result;
use async_trait::async_trait;

use crate::config::ToolsConfig;
use crate::error::{RagError, RagResult};
use crate::http;

/// Number of organic results folded into the answer text.
const MAX_ORGANIC: usize = 3;

/// A web search backend returning a plain-text digest of the results.
#[async_trait]
pub trait WebSearch: Send + Sync {
    fn name(&self) -> &str;
    async fn search(&self, query: &str) -> RagResult<String>;
}

/// Google results through the Serper API (`SERPER_API_KEY`).
pub struct SerperSearch {
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl SerperSearch {
    pub fn new(config: &ToolsConfig) -> Result<Self> {
        Self::with_api_key(config, http::api_key("SERPER_API_KEY")?)
    }

    pub fn with_api_key(config: &ToolsConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            url: config.search_url.clone(),
            api_key,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl WebSearch for SerperSearch {
    fn name(&self) -> &str {
        "serper"
    }

    async fn search(&self, query: &str) -> RagResult<String> {
        let body = serde_json::json!({ "q": query });
        let json = http::post_json(
            &self.client,
            &self.url,
            &[("X-API-KEY", self.api_key.clone())],
            &body,
            1,
            "Serper",
        )
        .await
        .map_err(|e| RagError::WebSearch(e.to_string()))?;
        Ok(digest(&json))
    }
}

/// Used when no search key is configured; every query fails.
pub struct DisabledSearch;

#[async_trait]
impl WebSearch for DisabledSearch {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn search(&self, _query: &str) -> RagResult<String> {
        Err(RagError::InvalidConfig(
            "web search is not configured (set SERPER_API_KEY)".to_string(),
        ))
    }
}

/// Collapse a Serper response into short text: the direct answer if there
/// is one, the knowledge-graph description, then the top organic snippets.
fn digest(json: &serde_json::Value) -> String {
    let mut lines = Vec::new();

    let direct = json
        .pointer("/answerBox/answer")
        .or_else(|| json.pointer("/answerBox/snippet"))
        .and_then(|v| v.as_str());
    if let Some(answer) = direct {
        lines.push(answer.trim().to_string());
    }
    if let Some(desc) = json
        .pointer("/knowledgeGraph/description")
        .and_then(|v| v.as_str())
    {
        lines.push(desc.trim().to_string());
    }
    if let Some(organic) = json.get("organic").and_then(|v| v.as_array()) {
        for item in organic.iter().take(MAX_ORGANIC) {
            let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("");
            let snippet = item.get("snippet").and_then(|v| v.as_str()).unwrap_or("");
            if snippet.is_empty() {
                continue;
            }
            match item.get("link").and_then(|v| v.as_str()) {
                Some(link) => lines.push(format!("- {}: {} ({})", title, snippet, link)),
                None => lines.push(format!("- {}: {}", title, snippet)),
            }
        }
    }

    if lines.is_empty() {
        "No results found.".to_string()
    } else {
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn digest_prefers_answer_box() {
        let json = json!({
            "answerBox": { "answer": "New Delhi" },
            "organic": [
                { "title": "India", "snippet": "Capital: New Delhi", "link": "https://example.org/india" },
                { "title": "Empty", "snippet": "" }
            ]
        });
        let text = digest(&json);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("New Delhi"));
        assert_eq!(
            lines.next(),
            Some("- India: Capital: New Delhi (https://example.org/india)")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn digest_caps_organic_results() {
        let organic: Vec<_> = (0..6)
            .map(|i| json!({ "title": format!("t{}", i), "snippet": "s" }))
            .collect();
        let text = digest(&json!({ "organic": organic }));
        assert_eq!(text.lines().count(), MAX_ORGANIC);
    }

    #[test]
    fn empty_response() {
        assert_eq!(digest(&json!({})), "No results found.");
    }

    #[tokio::test]
    async fn disabled_search_fails() {
        let err = DisabledSearch.search("rivers").await.unwrap_err();
        assert!(matches!(err, RagError::InvalidConfig(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_provider_is_a_retryable_web_search_error() {
        let config = ToolsConfig {
            search_url: "http://127.0.0.1:1/search".to_string(),
            timeout_secs: 2,
        };
        let search = SerperSearch::with_api_key(&config, "test-key".to_string()).unwrap();
        let err = search.search("monsoon").await.unwrap_err();
        assert!(matches!(err, RagError::WebSearch(_)), "got {:?}", err);
        assert!(err.is_retryable());
    }
}
