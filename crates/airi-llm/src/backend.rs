//! Completion backends.
//!
//! [`CompletionBackend`] is the upstream contract: ordered messages in,
//! one generated text out. [`OpenAiCompatibleBackend`] speaks the
//! `/chat/completions` API used by OpenRouter, Ollama and most hosted
//! providers.

use std::time::Duration;

use airi_core::config::{LlmConfig, LlmProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LlmError, Result};
use crate::prompt::ChatMessage;

/// Referer sent to OpenRouter for attribution.
const OPENROUTER_REFERER: &str = "https://github.com/airi-alex";

/// Longest upstream error body kept in an error.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// A single non-streamed completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f64,
}

/// Something that turns a message list into generated text.
///
/// Returns the generated message content, or an empty string when the
/// upstream produced none.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Provider name for diagnostics.
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP backend for OpenAI-compatible chat completion endpoints.
pub struct OpenAiCompatibleBackend {
    name: String,
    chat_url: String,
    headers: Vec<(String, String)>,
    client: Client,
}

impl OpenAiCompatibleBackend {
    /// `api_key` is sent as a bearer token when non-empty.
    pub fn new(name: &str, base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        let chat_url = if base_url.ends_with("/chat/completions") {
            base_url.to_string()
        } else {
            format!("{}/chat/completions", base_url)
        };

        let mut headers = Vec::new();
        if !api_key.is_empty() {
            headers.push(("Authorization".to_string(), format!("Bearer {}", api_key)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Config(e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            chat_url,
            headers,
            client,
        })
    }

    /// Build the backend for the provider selected in `config`.
    pub fn from_config(config: &LlmConfig, app_name: &str) -> Result<Self> {
        let mut backend = Self::new(
            config.provider.as_str(),
            config.base_url(),
            config.api_key(),
            config.timeout(),
        )?;
        if config.provider == LlmProvider::Openrouter {
            backend = backend
                .with_header("HTTP-Referer", OPENROUTER_REFERER)
                .with_header("X-Title", app_name);
        }
        Ok(backend)
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatibleBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let mut builder = self.client.post(&self.chat_url).json(request);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        debug!(provider = %self.name, chars = content.len(), "Completion received");
        Ok(content)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
