use std::sync::Arc;
use std::time::{Duration, Instant};

use airi_core::config::LlmConfig;
use airi_core::{ConversationTurn, Intent, RoutedBy, StructuredResponse};
use tracing::{info, warn};

use crate::backend::{CompletionBackend, CompletionRequest, OpenAiCompatibleBackend};
use crate::error::{LlmError, Result};
use crate::parser;
use crate::prompt::{build_messages, SYSTEM_PROMPT};

/// Spoken when the model returned nothing.
pub const EMPTY_RESPONSE_TEXT: &str =
    "I didn't get an answer from the AI. Check the API key or model name.";

/// `error` code for an empty completion.
pub const EMPTY_RESPONSE_ERROR: &str = "empty_llm_response";

/// Spoken when the completion call failed.
pub const UPSTREAM_FAILURE_TEXT: &str =
    "Sorry, I had trouble connecting to the AI. Please try again.";

/// Sampling and bounding parameters for completions.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    pub timeout: Duration,
    /// Exchanges of history included in the prompt; turns sent is twice this.
    pub max_turns: usize,
}

impl LlmSettings {
    pub fn from_config(config: &LlmConfig, max_turns: usize) -> Self {
        Self {
            model: config.model().to_string(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.timeout(),
            max_turns,
        }
    }
}

/// Language model fallback for utterances the rule router did not claim.
///
/// [`LlmClient::process`] never fails: upstream problems become a spoken
/// apology with an `error` code.
#[derive(Clone)]
pub struct LlmClient {
    backend: Arc<dyn CompletionBackend>,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(backend: Arc<dyn CompletionBackend>, settings: LlmSettings) -> Self {
        Self { backend, settings }
    }

    /// Client for the provider selected in `config`.
    pub fn from_config(config: &LlmConfig, app_name: &str, max_turns: usize) -> Result<Self> {
        let backend = OpenAiCompatibleBackend::from_config(config, app_name)?;
        info!(
            provider = config.provider.as_str(),
            model = config.model(),
            url = backend.chat_url(),
            "LLM client ready"
        );
        Ok(Self::new(
            Arc::new(backend),
            LlmSettings::from_config(config, max_turns),
        ))
    }

    pub fn settings(&self) -> &LlmSettings {
        &self.settings
    }

    pub fn provider(&self) -> &str {
        self.backend.name()
    }

    /// Ask the model about `text`, with prior turns as context.
    pub async fn process(&self, text: &str, history: &[ConversationTurn]) -> StructuredResponse {
        let request = self.build_request(text, history);
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.settings.timeout, self.backend.complete(&request))
            .await
            .unwrap_or(Err(LlmError::Timeout(self.settings.timeout)));
        let latency_ms = elapsed_ms(started);

        let raw = match outcome {
            Ok(raw) => raw,
            Err(e) => {
                warn!(
                    provider = self.backend.name(),
                    error = %e,
                    latency_ms,
                    "Completion failed"
                );
                return failure_response(&e);
            }
        };

        if raw.trim().is_empty() {
            warn!(provider = self.backend.name(), latency_ms, "Completion was empty");
            let mut resp = StructuredResponse::new(Intent::LlmResponse, RoutedBy::Llm)
                .with_text(EMPTY_RESPONSE_TEXT)
                .with_error(EMPTY_RESPONSE_ERROR);
            resp.latency_ms = Some(latency_ms);
            return resp;
        }

        let mut resp = parser::parse(&raw);
        resp.latency_ms = Some(latency_ms);
        info!(intent = %resp.intent, latency_ms, "LLM response parsed");
        resp
    }

    /// The request that [`LlmClient::process`] would send.
    pub fn build_request(&self, text: &str, history: &[ConversationTurn]) -> CompletionRequest {
        CompletionRequest {
            model: self.settings.model.clone(),
            messages: build_messages(
                SYSTEM_PROMPT,
                history,
                text,
                self.settings.max_turns * 2,
            ),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        }
    }
}

fn failure_response(err: &LlmError) -> StructuredResponse {
    StructuredResponse::new(Intent::LlmResponse, RoutedBy::Llm)
        .with_text(UPSTREAM_FAILURE_TEXT)
        .with_error(err.diagnostic())
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
