//! Standard Agent Loop
//!
//! The generic agentic loop for backends without a vendor-managed loop
//! (OpenAI-compatible servers, Gemini, Ollama):
//!
//! - Send the conversation, stream text deltas out as they arrive
//! - Assemble tool-call fragments by stream index
//! - Run each requested call through the `ToolExecutor`, in request order
//! - Repeat until the model stops asking for tools (or the iteration bound)
//!
//! Every stream opens with `model_info` and ends with exactly one `result`
//! or `error`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;

use crate::core::{FrameworkError, FrameworkResult, LoopState, NormalizedEvent, ResultPayload};
use crate::llm::{
    BackendEvent, ChatBackend, ChatRequest, ContentBlock, GeminiBackend, ImageInput, Message,
    OpenAiBackend, PriceTable, Usage,
};
use crate::mcp::AuxToolProvider;
use crate::provider::{EventStream, Provider, ProviderKind};

use super::config::ProviderConfig;
use super::executor::ToolExecutor;

/// A fully assembled tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Default)]
struct PartialCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

/// Assembles streamed tool-call fragments, keyed by stream index
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PartialCall>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one fragment; argument text is appended in arrival order
    pub fn push(&mut self, index: usize, id: Option<String>, name: Option<String>, arguments: &str) {
        let call = self.calls.entry(index).or_default();
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            call.id = Some(id);
        }
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            call.name = name;
        }
        call.arguments.push_str(arguments);
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Raw argument text assembled so far for `index`
    pub fn arguments(&self, index: usize) -> Option<&str> {
        self.calls.get(&index).map(|c| c.arguments.as_str())
    }

    /// Finished calls in index order
    ///
    /// Unparseable arguments become an empty object; calls without a name
    /// are dropped.
    pub fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_values()
            .filter_map(|call| {
                if call.name.is_empty() {
                    tracing::warn!("[Loop] Dropping tool call without a name");
                    return None;
                }

                let input = if call.arguments.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&call.arguments).unwrap_or_else(|e| {
                        tracing::warn!(
                            "[Loop] Invalid arguments for {}: {} (using empty input)",
                            call.name,
                            e
                        );
                        Value::Object(Default::default())
                    })
                };

                Some(ToolCall {
                    id: call
                        .id
                        .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4().simple())),
                    name: call.name,
                    input,
                })
            })
            .collect()
    }
}

/// State shared between the provider handle and its running streams
struct LoopShared {
    backend: Arc<dyn ChatBackend>,
    executor: Arc<ToolExecutor>,
    model: String,
    system_prompt: String,
    max_iterations: usize,
    prices: Arc<PriceTable>,
    zero_cost: bool,
    conversation: tokio::sync::Mutex<Vec<Message>>,
    pending: Mutex<Option<Message>>,
    interrupted: AtomicBool,
    disconnected: AtomicBool,
    aux: Option<Arc<AuxToolProvider>>,
}

impl LoopShared {
    fn cost(&self, usage: &Usage) -> f64 {
        if self.zero_cost {
            0.0
        } else {
            self.prices.cost(&self.model, usage)
        }
    }
}

fn set_state(state: &mut LoopState, next: LoopState) {
    if *state != next {
        tracing::debug!("[Loop] {} -> {}", state, next);
        *state = next;
    }
}

/// One model turn-sequence for the pending message
fn run_turn(shared: Arc<LoopShared>) -> impl futures::Stream<Item = NormalizedEvent> + Send {
    stream! {
        let started = Instant::now();
        yield NormalizedEvent::ModelInfo { model: shared.model.clone() };

        let pending = shared.pending.lock().take();
        let Some(message) = pending else {
            yield NormalizedEvent::error("No message to respond to: call send() first");
            return;
        };

        let mut conversation = shared.conversation.lock().await;
        conversation.push(message);

        let tools = shared.executor.definitions().await;
        let mut state = LoopState::Sending;
        let mut text = String::new();
        let mut usage = Usage::default();
        let mut turns: u32 = 0;

        loop {
            if shared.interrupted.load(Ordering::SeqCst) {
                tracing::info!("[Loop] Interrupted after {} turns", turns);
                yield NormalizedEvent::status("interrupted");
                break;
            }
            if turns as usize >= shared.max_iterations {
                tracing::warn!("[Loop] Reached iteration bound ({})", shared.max_iterations);
                yield NormalizedEvent::status(format!(
                    "truncated: stopped after {} iterations",
                    shared.max_iterations
                ));
                break;
            }

            turns += 1;
            set_state(&mut state, LoopState::Sending);

            let request = ChatRequest {
                model: shared.model.clone(),
                system_prompt: shared.system_prompt.clone(),
                messages: conversation.clone(),
                tools: tools.clone(),
            };

            let mut events = match shared.backend.stream_chat(request).await {
                Ok(events) => events,
                Err(e) => {
                    tracing::error!("[Loop] Backend request failed: {:#}", e);
                    yield NormalizedEvent::error(format!("{} request failed: {:#}", shared.backend.provider_name(), e));
                    return;
                }
            };

            let mut accumulator = ToolCallAccumulator::new();
            let mut turn_text = String::new();
            let mut failure = None;

            while let Some(item) = events.next().await {
                match item {
                    Ok(BackendEvent::TextDelta(delta)) => {
                        set_state(&mut state, LoopState::StreamingText);
                        turn_text.push_str(&delta);
                        yield NormalizedEvent::text(delta);
                    }
                    Ok(BackendEvent::ToolCallDelta { index, id, name, arguments }) => {
                        set_state(&mut state, LoopState::StreamingText);
                        accumulator.push(index, id, name, &arguments);
                    }
                    Ok(BackendEvent::Usage(turn_usage)) => usage.add(turn_usage),
                    Ok(BackendEvent::Stop) => break,
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }

            if let Some(e) = failure {
                tracing::error!("[Loop] Stream failed: {:#}", e);
                yield NormalizedEvent::error(format!("{} stream failed: {:#}", shared.backend.provider_name(), e));
                return;
            }

            set_state(&mut state, LoopState::AwaitingTools);
            let calls = accumulator.finish();
            text.push_str(&turn_text);

            let mut blocks = Vec::new();
            if !turn_text.is_empty() {
                blocks.push(ContentBlock::text(turn_text));
            }
            for call in &calls {
                blocks.push(ContentBlock::tool_use(&call.id, &call.name, call.input.clone()));
            }
            if calls.is_empty() {
                if !blocks.is_empty() {
                    conversation.push(Message::assistant_with_blocks(blocks));
                }
                break;
            }

            set_state(&mut state, LoopState::ExecutingTools);
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                yield NormalizedEvent::ToolUse {
                    name: call.name.clone(),
                    id: call.id.clone(),
                    input: call.input.clone(),
                };

                let result = shared.executor.execute(&call.name, &call.input).await;

                yield NormalizedEvent::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: result.content.clone(),
                    is_error: result.is_error,
                };
                results.push(ContentBlock::tool_result(call.id, result.content, result.is_error));
            }
            // Tool calls enter the history only together with their results
            conversation.push(Message::assistant_with_blocks(blocks));
            conversation.push(Message::user_with_blocks(results));
        }

        set_state(&mut state, LoopState::Done);
        yield NormalizedEvent::Result(ResultPayload {
            text,
            session_id: None,
            cost_usd: shared.cost(&usage),
            duration_ms: started.elapsed().as_millis() as u64,
            num_turns: turns,
            is_error: false,
            usage,
        });
    }
}

/// Provider for OpenAI, Gemini and Ollama, running the generic loop
pub struct StandardProvider {
    kind: ProviderKind,
    backend_override: Option<Arc<dyn ChatBackend>>,
    shared: Option<Arc<LoopShared>>,
}

impl StandardProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            backend_override: None,
            shared: None,
        }
    }

    /// Use this backend instead of the one `kind` would create
    pub fn with_backend(mut self, backend: Arc<dyn ChatBackend>) -> Self {
        self.backend_override = Some(backend);
        self
    }

    fn create_backend(&self, config: &ProviderConfig) -> FrameworkResult<Arc<dyn ChatBackend>> {
        if let Some(backend) = &self.backend_override {
            return Ok(backend.clone());
        }

        config.credentials.validate(self.kind)?;
        let credentials = config.credentials.clone();
        match self.kind {
            ProviderKind::OpenAi => Ok(Arc::new(OpenAiBackend::new(credentials))),
            ProviderKind::Ollama => Ok(Arc::new(OpenAiBackend::ollama(credentials))),
            ProviderKind::Gemini => Ok(Arc::new(
                GeminiBackend::new(credentials).map_err(FrameworkError::backend)?,
            )),
            ProviderKind::Claude => Err(FrameworkError::InvalidConfig(
                "claude runs through the managed provider".to_string(),
            )),
        }
    }

    fn shared(&self) -> FrameworkResult<&Arc<LoopShared>> {
        self.shared.as_ref().ok_or(FrameworkError::NotInitialized)
    }
}

#[async_trait]
impl Provider for StandardProvider {
    async fn initialize(&mut self, config: ProviderConfig) -> FrameworkResult<()> {
        if self.shared.is_some() {
            return Err(FrameworkError::AlreadyInitialized);
        }

        let backend = self.create_backend(&config)?;
        let executor = config.build_executor()?;

        let aux = if config.aux_servers.is_empty() {
            None
        } else {
            let provider = Arc::new(
                AuxToolProvider::connect_all(&config.aux_servers, config.aux_status.clone()).await,
            );
            if let Err(e) = executor.add_provider(provider.clone()).await {
                tracing::warn!("[{}] Auxiliary tools unavailable: {:#}", self.kind, e);
            }
            Some(provider)
        };

        tracing::info!(
            "[{}] Initialized agent {} with model {}",
            self.kind,
            config.agent_id,
            config.model
        );

        self.shared = Some(Arc::new(LoopShared {
            backend,
            executor: Arc::new(executor),
            model: config.model,
            system_prompt: config.system_prompt,
            max_iterations: config.max_iterations,
            prices: config.prices,
            zero_cost: self.kind.is_local(),
            conversation: tokio::sync::Mutex::new(Vec::new()),
            pending: Mutex::new(None),
            interrupted: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
            aux,
        }));

        Ok(())
    }

    async fn send(&self, text: &str, images: Vec<ImageInput>) -> FrameworkResult<()> {
        let shared = self.shared()?;
        if shared.disconnected.load(Ordering::SeqCst) {
            return Err(FrameworkError::NotInitialized);
        }

        let message = if images.is_empty() {
            Message::user(text)
        } else {
            Message::user_with_images(text, images)
        };
        *shared.pending.lock() = Some(message);
        shared.interrupted.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn stream(&self) -> EventStream {
        match &self.shared {
            Some(shared) => Box::pin(run_turn(shared.clone())),
            None => Box::pin(futures::stream::once(async {
                NormalizedEvent::error(FrameworkError::NotInitialized.to_string())
            })),
        }
    }

    async fn interrupt(&self) {
        if let Some(shared) = &self.shared {
            shared.interrupted.store(true, Ordering::SeqCst);
        }
    }

    async fn disconnect(&self) {
        let Some(shared) = &self.shared else {
            return;
        };
        if shared.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }

        shared.interrupted.store(true, Ordering::SeqCst);
        if let Some(aux) = &shared.aux {
            aux.disconnect().await;
        }
        tracing::info!("[{}] Disconnected", self.kind);
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::BackendStream;
    use crate::permissions::{AutoApprove, ConsentDecision, ConsentHandler, ConsentRequest, DenyAll};
    use crate::tools::EchoTool;
    use serde_json::json;
    use std::collections::VecDeque;

    /// Backend that replays one scripted response per request
    pub(crate) struct ScriptedBackend {
        turns: Mutex<VecDeque<Vec<anyhow::Result<BackendEvent>>>>,
        pub(crate) requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedBackend {
        pub(crate) fn new(turns: Vec<Vec<anyhow::Result<BackendEvent>>>) -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(turns.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        /// Backend that asks for the same tool forever
        pub(crate) fn looping(tool: &str, rounds: usize) -> Arc<Self> {
            let turns = (0..rounds)
                .map(|i| {
                    vec![
                        Ok(BackendEvent::ToolCallDelta {
                            index: 0,
                            id: Some(format!("call_{}", i)),
                            name: Some(tool.to_string()),
                            arguments: "{}".into(),
                        }),
                        Ok(BackendEvent::Stop),
                    ]
                })
                .collect();
            Self::new(turns)
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedBackend {
        async fn stream_chat(&self, request: ChatRequest) -> anyhow::Result<BackendStream> {
            self.requests.lock().push(request);
            let turn = self
                .turns
                .lock()
                .pop_front()
                .unwrap_or_else(|| vec![Ok(BackendEvent::TextDelta("done".into())), Ok(BackendEvent::Stop)]);
            Ok(Box::pin(futures::stream::iter(turn)))
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }
    }

    fn text_turn(text: &str) -> Vec<anyhow::Result<BackendEvent>> {
        vec![
            Ok(BackendEvent::TextDelta(text.to_string())),
            Ok(BackendEvent::Usage(Usage::new(1_000, 500))),
            Ok(BackendEvent::Stop),
        ]
    }

    async fn provider_with(
        kind: ProviderKind,
        backend: Arc<ScriptedBackend>,
        consent: Arc<dyn ConsentHandler>,
        max_iterations: usize,
    ) -> (tempfile::TempDir, StandardProvider) {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig::new("gpt-4o", dir.path(), consent)
            .with_tool(EchoTool::named("echo"))
            .with_max_iterations(max_iterations);
        let mut provider = StandardProvider::new(kind).with_backend(backend);
        provider.initialize(config).await.unwrap();
        (dir, provider)
    }

    async fn collect(provider: &StandardProvider) -> Vec<NormalizedEvent> {
        provider.stream().collect().await
    }

    fn result_of(events: &[NormalizedEvent]) -> &ResultPayload {
        match events.last() {
            Some(NormalizedEvent::Result(payload)) => payload,
            other => panic!("expected result, got {:?}", other),
        }
    }

    #[test]
    fn test_interleaved_fragments_by_index() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(0, Some("a".into()), Some("Read".into()), "{\"file_");
        acc.push(1, Some("b".into()), Some("Glob".into()), "{\"pat");
        acc.push(0, None, None, "path\": \"x\"}");
        acc.push(1, None, None, "tern\": \"*\"}");

        assert_eq!(acc.arguments(0), Some("{\"file_path\": \"x\"}"));
        assert_eq!(acc.arguments(1), Some("{\"pattern\": \"*\"}"));

        let calls = acc.finish();
        assert_eq!(calls[0].name, "Read");
        assert_eq!(calls[0].input, json!({ "file_path": "x" }));
        assert_eq!(calls[1].id, "b");
    }

    #[test]
    fn test_bad_arguments_become_empty() {
        let mut acc = ToolCallAccumulator::new();
        acc.push(0, None, Some("Read".into()), "{not json");
        let calls = acc.finish();
        assert_eq!(calls[0].input, json!({}));
        assert!(calls[0].id.starts_with("call_"));
    }

    #[tokio::test]
    async fn test_text_only_turn() {
        let backend = ScriptedBackend::new(vec![text_turn("Hello")]);
        let (_dir, provider) =
            provider_with(ProviderKind::OpenAi, backend, Arc::new(AutoApprove), 10).await;

        provider.send("hi", vec![]).await.unwrap();
        let events = collect(&provider).await;

        assert!(matches!(&events[0], NormalizedEvent::ModelInfo { model } if model == "gpt-4o"));
        assert_eq!(events[1], NormalizedEvent::text("Hello"));

        let result = result_of(&events);
        assert_eq!(result.text, "Hello");
        assert_eq!(result.num_turns, 1);
        assert_eq!(result.usage, Usage::new(1_000, 500));
        // gpt-4o: 2.50 in / 10.00 out per million
        assert!((result.cost_usd - 0.0075).abs() < 1e-9);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_tool_round_trip() {
        let backend = ScriptedBackend::new(vec![
            vec![
                Ok(BackendEvent::TextDelta("Checking. ".into())),
                Ok(BackendEvent::ToolCallDelta {
                    index: 0,
                    id: Some("call_1".into()),
                    name: Some("echo".into()),
                    arguments: "{\"x\":".into(),
                }),
                Ok(BackendEvent::ToolCallDelta {
                    index: 0,
                    id: None,
                    name: None,
                    arguments: "1}".into(),
                }),
                Ok(BackendEvent::Stop),
            ],
            text_turn("Done."),
        ]);
        let (_dir, provider) =
            provider_with(ProviderKind::OpenAi, backend.clone(), Arc::new(AutoApprove), 10).await;

        provider.send("go", vec![]).await.unwrap();
        let events = collect(&provider).await;

        let use_pos = events
            .iter()
            .position(|e| matches!(e, NormalizedEvent::ToolUse { id, .. } if id == "call_1"))
            .unwrap();
        let result_pos = events
            .iter()
            .position(|e| matches!(e, NormalizedEvent::ToolResult { tool_use_id, .. } if tool_use_id == "call_1"))
            .unwrap();
        assert!(use_pos < result_pos);

        match &events[result_pos] {
            NormalizedEvent::ToolResult { content, is_error, .. } => {
                assert!(!is_error);
                assert!(content.starts_with("echo:"));
                assert!(content.contains("\"x\":1"));
            }
            _ => unreachable!(),
        }

        let result = result_of(&events);
        assert_eq!(result.text, "Checking. Done.");
        assert_eq!(result.num_turns, 2);

        // Second request carries the assistant tool call and its result
        let requests = backend.requests.lock();
        let second = &requests[1].messages;
        assert_eq!(second.len(), 3);
        assert!(matches!(&second[2].content[0], ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "call_1"));
    }

    #[tokio::test]
    async fn test_denied_tool_does_not_abort() {
        struct Counting(std::sync::atomic::AtomicUsize);

        #[async_trait]
        impl ConsentHandler for Counting {
            async fn decide(&self, _request: &ConsentRequest) -> ConsentDecision {
                self.0.fetch_add(1, Ordering::SeqCst);
                ConsentDecision::Denied
            }
        }

        let backend = ScriptedBackend::new(vec![
            vec![
                Ok(BackendEvent::ToolCallDelta {
                    index: 0,
                    id: Some("w1".into()),
                    name: Some("Write".into()),
                    arguments: "{\"file_path\":\"a.txt\",\"content\":\"x\"}".into(),
                }),
                Ok(BackendEvent::Stop),
            ],
            text_turn("Could not write."),
        ]);
        let consent = Arc::new(Counting(Default::default()));
        let (dir, provider) =
            provider_with(ProviderKind::OpenAi, backend, consent.clone(), 10).await;

        provider.send("write it", vec![]).await.unwrap();
        let events = collect(&provider).await;

        assert!(events.iter().any(|e| matches!(e, NormalizedEvent::ToolResult { is_error: true, .. })));
        assert!(!result_of(&events).is_error);
        assert_eq!(consent.0.load(Ordering::SeqCst), 1);
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn test_iteration_bound_truncates() {
        let backend = ScriptedBackend::looping("echo", 10);
        let (_dir, provider) =
            provider_with(ProviderKind::OpenAi, backend, Arc::new(AutoApprove), 3).await;

        provider.send("loop", vec![]).await.unwrap();
        let events = collect(&provider).await;

        let truncated = events.iter().any(|e| {
            matches!(e, NormalizedEvent::Status { message } if message.starts_with("truncated"))
        });
        assert!(truncated);
        let result = result_of(&events);
        assert_eq!(result.num_turns, 3);
        assert!(!result.is_error);
    }

    #[tokio::test]
    async fn test_backend_error_is_single_terminal_event() {
        let backend = ScriptedBackend::new(vec![vec![
            Ok(BackendEvent::TextDelta("partial".into())),
            Err(anyhow::anyhow!("connection reset")),
        ]]);
        let (_dir, provider) =
            provider_with(ProviderKind::Gemini, backend, Arc::new(AutoApprove), 10).await;

        provider.send("hi", vec![]).await.unwrap();
        let events = collect(&provider).await;

        assert!(matches!(events.last(), Some(NormalizedEvent::Error { message }) if message.contains("connection reset")));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_interrupt_between_iterations() {
        let backend = ScriptedBackend::looping("echo", 10);
        let (_dir, provider) =
            provider_with(ProviderKind::OpenAi, backend, Arc::new(AutoApprove), 10).await;

        provider.send("loop", vec![]).await.unwrap();
        let mut events = provider.stream();
        let mut seen = Vec::new();
        while let Some(event) = events.next().await {
            if matches!(event, NormalizedEvent::ToolResult { .. }) {
                provider.interrupt().await;
            }
            seen.push(event);
        }

        assert!(seen.iter().any(|e| *e == NormalizedEvent::status("interrupted")));
        assert_eq!(result_of(&seen).num_turns, 1);
    }

    #[tokio::test]
    async fn test_dropped_stream_leaves_no_dangling_tool_call() {
        let backend = ScriptedBackend::looping("echo", 1);
        let (_dir, provider) =
            provider_with(ProviderKind::OpenAi, backend.clone(), Arc::new(AutoApprove), 10).await;

        provider.send("go", vec![]).await.unwrap();
        {
            let mut events = provider.stream();
            while let Some(event) = events.next().await {
                if matches!(event, NormalizedEvent::ToolUse { .. }) {
                    break;
                }
            }
        }

        provider.send("again", vec![]).await.unwrap();
        let events = collect(&provider).await;
        assert!(!result_of(&events).is_error);

        let requests = backend.requests.lock();
        let last = &requests.last().unwrap().messages;
        let calls: Vec<&str> = last
            .iter()
            .flat_map(|m| m.content.iter())
            .filter_map(|b| match b {
                ContentBlock::ToolUse { id, .. } => Some(id.as_str()),
                _ => None,
            })
            .collect();
        for id in calls {
            assert!(last.iter().flat_map(|m| m.content.iter()).any(|b| {
                matches!(b, ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == id)
            }));
        }
        assert_eq!(last.last().unwrap().text(), "again");
    }

    #[tokio::test]
    async fn test_ollama_is_free_and_lifecycle_errors() {
        let backend = ScriptedBackend::new(vec![text_turn("hi")]);
        let (_dir, mut provider) =
            provider_with(ProviderKind::Ollama, backend, Arc::new(DenyAll), 10).await;

        provider.send("hi", vec![]).await.unwrap();
        let events = collect(&provider).await;
        assert_eq!(result_of(&events).cost_usd, 0.0);

        let dir = tempfile::tempdir().unwrap();
        let again = provider
            .initialize(ProviderConfig::new("m", dir.path(), Arc::new(DenyAll)))
            .await;
        assert!(matches!(again, Err(FrameworkError::AlreadyInitialized)));

        provider.disconnect().await;
        provider.disconnect().await;
        assert!(provider.send("late", vec![]).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = StandardProvider::new(ProviderKind::OpenAi);
        let err = provider
            .initialize(ProviderConfig::new("gpt-4o", dir.path(), Arc::new(DenyAll)))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::MissingCredentials { .. }));

        let events: Vec<_> = provider.stream().collect().await;
        assert!(matches!(events.as_slice(), [NormalizedEvent::Error { .. }]));
    }
}
