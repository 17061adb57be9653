//! Language-model completion providers.
//!
//! [`CompletionProvider`] is the single seam through which the pipeline
//! reaches a hosted language model. Implementations:
//!
//! | Config Value | Provider | Endpoint |
//! |-------------|----------|----------|
//! | `"disabled"` | [`DisabledCompletion`] | — |
//! | `"gemini"` | [`GeminiCompletion`] | `POST /v1beta/models/{model}:generateContent` |
//! | `"openai"` | [`OpenAICompletion`] | `POST /v1/chat/completions` |
//! | `"ollama"` | [`OllamaCompletion`] | `POST /api/generate` |
//!
//! Hosted providers share the retry/backoff policy in [`crate::http`].

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::CompletionConfig;
use crate::error::{RagError, RagResult};
use crate::http;

/// A black-box text completion service.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-2.5-flash"`).
    fn model_name(&self) -> &str;
    /// Complete a single prompt and return the generated text.
    async fn complete(&self, prompt: &str) -> RagResult<String>;
}

/// Provider used when no completion service is configured.
pub struct DisabledCompletion;

#[async_trait]
impl CompletionProvider for DisabledCompletion {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn complete(&self, _prompt: &str) -> RagResult<String> {
        Err(RagError::CompletionService(
            "Completion provider is disabled".to_string(),
        ))
    }
}

/// Sampling settings shared by every hosted provider.
#[derive(Debug, Clone)]
struct Sampling {
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl From<&CompletionConfig> for Sampling {
    fn from(config: &CompletionConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        }
    }
}

// ============ Gemini ============

/// Completion via the Google Generative Language API (`GOOGLE_API_KEY`).
pub struct GeminiCompletion {
    model: String,
    base_url: String,
    api_key: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl GeminiCompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            api_key: http::api_key("GOOGLE_API_KEY")?,
            sampling: Sampling::from(config),
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for GeminiCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> RagResult<String> {
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": self.sampling.temperature,
                "maxOutputTokens": self.sampling.max_tokens,
            },
        });
        let json = http::post_json(
            &self.client,
            &format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ),
            &[("x-goog-api-key", self.api_key.clone())],
            &body,
            self.sampling.max_retries,
            "Gemini",
        )
        .await
        .map_err(service_error)?;
        parse_gemini_response(&json).map_err(service_error)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("missing candidates");
            anyhow::anyhow!("Invalid Gemini response: {}", reason)
        })?;

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

// ============ OpenAI ============

/// Completion via an OpenAI-compatible chat completions endpoint (`OPENAI_API_KEY`).
pub struct OpenAICompletion {
    model: String,
    base_url: String,
    api_key: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl OpenAICompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for OpenAI provider"))?;
        Ok(Self {
            model,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            api_key: http::api_key("OPENAI_API_KEY")?,
            sampling: Sampling::from(config),
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for OpenAICompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> RagResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.sampling.temperature,
            "max_tokens": self.sampling.max_tokens,
        });
        let json = http::post_json(
            &self.client,
            &format!("{}/v1/chat/completions", self.base_url),
            &[("Authorization", format!("Bearer {}", self.api_key))],
            &body,
            self.sampling.max_retries,
            "OpenAI",
        )
        .await
        .map_err(service_error)?;
        json.pointer("/choices/0/message/content")
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                RagError::CompletionService(
                    "Invalid OpenAI response: missing choices[0].message.content".to_string(),
                )
            })
    }
}

// ============ Ollama ============

/// Completion via a local Ollama instance (`/api/generate`, non-streaming).
pub struct OllamaCompletion {
    model: String,
    url: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl OllamaCompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("completion.model required for Ollama provider"))?;
        Ok(Self {
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            sampling: Sampling::from(config),
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletion {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> RagResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.sampling.temperature,
                "num_predict": self.sampling.max_tokens,
            },
        });
        let json = http::post_json(
            &self.client,
            &format!("{}/api/generate", self.url),
            &[],
            &body,
            self.sampling.max_retries,
            "Ollama",
        )
        .await
        .map_err(service_error)?;
        json.get("response")
            .and_then(|r| r.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                RagError::CompletionService("Invalid Ollama response: missing response".into())
            })
    }
}

fn service_error(e: anyhow::Error) -> RagError {
    RagError::CompletionService(e.to_string())
}

/// Create the configured [`CompletionProvider`].
pub fn create_completion_provider(config: &CompletionConfig) -> Result<Arc<dyn CompletionProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompletion)),
        "gemini" => Ok(Arc::new(GeminiCompletion::new(config)?)),
        "openai" => Ok(Arc::new(OpenAICompletion::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaCompletion::new(config)?)),
        other => anyhow::bail!("Unknown completion provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gemini_parts_are_joined() {
        let json = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Tokyo " }, { "text": "is the capital." }] }
            }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "Tokyo is the capital.");
    }

    #[test]
    fn gemini_block_reason_is_reported() {
        let json = serde_json::json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_gemini_response(&json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[tokio::test]
    async fn disabled_completion_errors() {
        let err = DisabledCompletion.complete("hi").await.unwrap_err();
        assert!(matches!(err, RagError::CompletionService(_)));
    }

    #[test]
    fn ollama_requires_model() {
        let config = CompletionConfig {
            provider: "ollama".to_string(),
            ..CompletionConfig::default()
        };
        assert!(create_completion_provider(&config).is_err());
    }
}
