use std::sync::Arc;
use std::time::{Duration, Instant};

use airi_core::{AssistantRequest, StructuredResponse};
use airi_llm::LlmClient;
use airi_memory::SessionMemory;
use airi_router::RuleRouter;
use tokio_stream::Stream;
use tracing::{debug, info};

use crate::events::{word_tokens, StreamEvent};

/// Request orchestrator. Cheap to clone; every component is shared.
#[derive(Clone)]
pub struct Assistant {
    router: Arc<RuleRouter>,
    llm: LlmClient,
    memory: SessionMemory,
    token_delay: Duration,
}

impl Assistant {
    pub fn new(
        router: RuleRouter,
        llm: LlmClient,
        memory: SessionMemory,
        token_delay: Duration,
    ) -> Self {
        Self {
            router: Arc::new(router),
            llm,
            memory,
            token_delay,
        }
    }

    pub fn llm(&self) -> &LlmClient {
        &self.llm
    }

    pub fn memory(&self) -> &SessionMemory {
        &self.memory
    }

    /// One-shot protocol: rule router, else history plus LLM; stamp the
    /// whole-request latency and record the exchange.
    pub async fn process(&self, request: &AssistantRequest) -> StructuredResponse {
        let started = Instant::now();
        if request.partial {
            debug!("Partial transcript ignored");
            return StructuredResponse::partial();
        }

        let text = request.text.trim();
        let session = request.session();
        info!(session = session.unwrap_or("anon"), chars = text.len(), "Processing request");

        let mut resp = match self.router.route(text) {
            Some(resp) => resp,
            None => self.ask_llm(text, session).await,
        };
        resp.latency_ms = Some(elapsed_ms(started));
        info!(
            session = session.unwrap_or("anon"),
            intent = %resp.intent,
            routed_by = ?resp.routed_by,
            latency_ms = resp.latency_ms,
            "Request handled"
        );

        if let Some(session) = session {
            self.remember(session, text, &resp).await;
        }
        resp
    }

    /// Streamed protocol. A rule match yields a single `Done`; otherwise
    /// `Thinking`, one `Token` per word paced by the configured delay, then
    /// `Done`. The exchange is recorded after `Done` is taken, so a caller
    /// that drops the stream early skips it.
    pub fn stream(&self, request: AssistantRequest) -> impl Stream<Item = StreamEvent> + Send + 'static {
        let this = self.clone();
        async_stream::stream! {
            let started = Instant::now();
            if request.partial {
                yield StreamEvent::Done(StructuredResponse::partial());
                return;
            }

            let text = request.text.trim();
            let session = request.session();

            if let Some(mut resp) = this.router.route(text) {
                resp.latency_ms = Some(elapsed_ms(started));
                yield StreamEvent::Done(resp.clone());
                if let Some(session) = session {
                    this.remember(session, text, &resp).await;
                }
                return;
            }

            yield StreamEvent::Thinking;

            let resp = this.ask_llm(text, session).await;
            let tokens = word_tokens(resp.spoken_text());
            let count = tokens.len();
            for (i, value) in tokens.into_iter().enumerate() {
                yield StreamEvent::Token { value };
                if i + 1 < count {
                    tokio::time::sleep(this.token_delay).await;
                }
            }
            debug!(tokens = count, intent = %resp.intent, "Stream complete");

            yield StreamEvent::Done(resp.clone());
            if let Some(session) = session {
                this.remember(session, text, &resp).await;
            }
        }
    }

    /// Clear a session's history. Always succeeds.
    pub async fn clear_memory(&self, session_id: &str) {
        self.memory.clear(session_id).await;
    }

    async fn ask_llm(&self, text: &str, session: Option<&str>) -> StructuredResponse {
        let history = match session {
            Some(session) => self.memory.get_history(session).await,
            None => Vec::new(),
        };
        self.llm.process(text, &history).await
    }

    /// Store the exchange; the assistant turn is the serialized response.
    async fn remember(&self, session: &str, text: &str, resp: &StructuredResponse) {
        let assistant_turn = resp
            .to_json()
            .unwrap_or_else(|_| resp.spoken_text().to_string());
        self.memory.append(session, text, &assistant_turn).await;
    }
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("rules", &self.router.rules().len())
            .field("provider", &self.llm.provider())
            .field("memory", &self.memory)
            .field("token_delay", &self.token_delay)
            .finish()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use airi_core::config::MemoryConfig;
    use airi_core::{Intent, Role, RoutedBy};
    use airi_llm::{CompletionBackend, CompletionRequest, LlmSettings};
    use airi_memory::InProcessStore;
    use async_trait::async_trait;
    use tokio_stream::StreamExt;

    /// Answers every completion with a fixed reply and records requests.
    struct StubBackend {
        reply: String,
        calls: AtomicUsize,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl StubBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for StubBackend {
        async fn complete(&self, request: &CompletionRequest) -> airi_llm::error::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    const CHAT_REPLY: &str =
        r#"{"intent":"llm_response","text_response":"The sky is blue today"}"#;

    fn assistant(backend: Arc<StubBackend>) -> Assistant {
        let settings = LlmSettings {
            model: "stub-model".to_string(),
            max_tokens: 128,
            temperature: 0.1,
            timeout: Duration::from_secs(5),
            max_turns: 10,
        };
        let memory = SessionMemory::new(Arc::new(InProcessStore::new()), &MemoryConfig::default());
        Assistant::new(
            RuleRouter::default(),
            LlmClient::new(backend, settings),
            memory,
            Duration::from_millis(40),
        )
    }

    async fn collect(assistant: &Assistant, request: AssistantRequest) -> Vec<StreamEvent> {
        assistant.stream(request).collect().await
    }

    #[tokio::test]
    async fn test_process_rule_match_skips_llm() {
        let backend = StubBackend::new(CHAT_REPLY);
        let assistant = assistant(backend.clone());
        let resp = assistant.process(&AssistantRequest::new("Open WhatsApp")).await;
        assert_eq!(resp.intent, Intent::OpenApp);
        assert_eq!(resp.routed_by, RoutedBy::Rule);
        assert_eq!(resp.app_package.as_deref(), Some("com.whatsapp"));
        assert!(resp.latency_ms.is_some());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_process_falls_back_to_llm() {
        let backend = StubBackend::new(CHAT_REPLY);
        let assistant = assistant(backend.clone());
        let resp = assistant
            .process(&AssistantRequest::new("Why is the sky blue?"))
            .await;
        assert_eq!(resp.intent, Intent::LlmResponse);
        assert_eq!(resp.routed_by, RoutedBy::Llm);
        assert_eq!(resp.text_response.as_deref(), Some("The sky is blue today"));
        assert!(resp.latency_ms.is_some());
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_process_partial_short_circuits() {
        let backend = StubBackend::new(CHAT_REPLY);
        let assistant = assistant(backend.clone());
        let mut request = AssistantRequest::new("Why is the").with_session("s1");
        request.partial = true;

        let resp = assistant.process(&request).await;
        assert_eq!(resp.intent, Intent::Unknown);
        assert!(resp.text_response.is_none());
        assert_eq!(backend.calls(), 0);
        assert!(assistant.memory().get_history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_process_records_exchange_and_replays_history() {
        let backend = StubBackend::new(CHAT_REPLY);
        let assistant = assistant(backend.clone());

        assistant
            .process(&AssistantRequest::new("  Open Spotify  ").with_session("s1"))
            .await;
        let history = assistant.memory().get_history("s1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "Open Spotify");
        assert_eq!(history[1].role, Role::Assistant);
        let stored: StructuredResponse = serde_json::from_str(&history[1].content).unwrap();
        assert_eq!(stored.intent, Intent::OpenApp);

        assistant
            .process(&AssistantRequest::new("What was that?").with_session("s1"))
            .await;
        let seen = backend.seen.lock().unwrap();
        // System, two history turns, new user turn.
        assert_eq!(seen[0].messages.len(), 4);
        assert_eq!(seen[0].messages[1].content, "Open Spotify");
        drop(seen);

        assert_eq!(assistant.memory().get_history("s1").await.len(), 4);
    }

    #[tokio::test]
    async fn test_process_without_session_leaves_memory_alone() {
        let backend = StubBackend::new(CHAT_REPLY);
        let assistant = assistant(backend);
        assistant.process(&AssistantRequest::new("Hello there")).await;
        assert!(assistant.memory().get_history("").await.is_empty());
    }

    #[tokio::test]
    async fn test_stream_rule_match_is_single_done() {
        let backend = StubBackend::new(CHAT_REPLY);
        let assistant = assistant(backend.clone());
        let events = collect(&assistant, AssistantRequest::new("Call John please")).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Done(resp) => {
                assert_eq!(resp.intent, Intent::MakeCall);
                assert_eq!(resp.contact_name.as_deref(), Some("John"));
            }
            other => panic!("expected done, got {:?}", other),
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_llm_event_order() {
        let backend = StubBackend::new(CHAT_REPLY);
        let assistant = assistant(backend);
        let events = collect(
            &assistant,
            AssistantRequest::new("Why is the sky blue?").with_session("s1"),
        )
        .await;

        assert_eq!(events.first(), Some(&StreamEvent::Thinking));
        assert!(events.last().map(StreamEvent::is_done).unwrap_or(false));
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);

        let tokens: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Token { value } => Some(value.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, vec!["The ", "sky ", "is ", "blue ", "today"]);

        match events.last() {
            Some(StreamEvent::Done(resp)) => {
                assert_eq!(resp.routed_by, RoutedBy::Llm);
                assert_eq!(resp.text_response.as_deref(), Some("The sky is blue today"));
            }
            other => panic!("expected done, got {:?}", other),
        }
        assert_eq!(assistant.memory().get_history("s1").await.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_paces_tokens() {
        let backend = StubBackend::new(CHAT_REPLY);
        let assistant = assistant(backend);
        let started = tokio::time::Instant::now();
        collect(&assistant, AssistantRequest::new("Why is the sky blue?")).await;
        // Four gaps between five words.
        assert!(started.elapsed() >= Duration::from_millis(160));
    }

    #[tokio::test]
    async fn test_stream_partial_is_single_unknown_done() {
        let backend = StubBackend::new(CHAT_REPLY);
        let assistant = assistant(backend.clone());
        let mut request = AssistantRequest::new("Why is");
        request.partial = true;

        let events = collect(&assistant, request).await;
        assert_eq!(events, vec![StreamEvent::Done(StructuredResponse::partial())]);
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_stream_dropped_early_skips_memory() {
        let backend = StubBackend::new(CHAT_REPLY);
        let assistant = assistant(backend);
        {
            let stream = assistant.stream(AssistantRequest::new("Why is the sky blue?").with_session("s1"));
            tokio::pin!(stream);
            assert_eq!(stream.next().await, Some(StreamEvent::Thinking));
        }
        assert!(assistant.memory().get_history("s1").await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_memory() {
        let backend = StubBackend::new(CHAT_REPLY);
        let assistant = assistant(backend);
        assistant
            .process(&AssistantRequest::new("Open Spotify").with_session("s1"))
            .await;
        assistant.clear_memory("s1").await;
        assistant.clear_memory("s1").await;
        assert!(assistant.memory().get_history("s1").await.is_empty());
    }
}
