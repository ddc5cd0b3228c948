//! Managed Provider
//!
//! Claude runs its agentic loop inside the CLI client. This provider only
//! translates the client's stream-json lines into [`NormalizedEvent`]s and
//! answers its `can_use_tool` questions through the executor's permission
//! gate. Auxiliary servers are handed to the client at startup, so a bad
//! server is handled by progressive degradation during `initialize`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use async_stream::stream;
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::agent::{ProviderConfig, ToolExecutor};
use crate::core::{FrameworkError, FrameworkResult, NormalizedEvent, ResultPayload};
use crate::llm::{ImageInput, PriceTable, Usage};
use crate::mcp::{connect_with_degradation, AuxServerConfig};
use crate::provider::{EventStream, Provider, ProviderKind};

use super::client::{
    ClaudeCliConnector, LaunchOptions, ManagedConnector, SessionReader, SessionWriter,
};
use super::protocol::{self, CliContent, CliMessage};

/// State shared between the provider handle and its running streams
struct ManagedShared {
    executor: Arc<ToolExecutor>,
    model: String,
    prices: Arc<PriceTable>,
    reader: tokio::sync::Mutex<SessionReader>,
    writer: tokio::sync::Mutex<SessionWriter>,
    session_id: Mutex<Option<String>>,
    active_servers: Vec<AuxServerConfig>,
    awaiting_turn: AtomicBool,
    interrupted: AtomicBool,
    disconnected: AtomicBool,
}

impl ManagedShared {
    async fn write(&self, value: &serde_json::Value) -> anyhow::Result<()> {
        self.writer.lock().await.write_json(value).await
    }

    /// Answer one `can_use_tool` request
    async fn answer_permission(
        &self,
        request_id: &str,
        tool_name: &str,
        input: &serde_json::Value,
    ) -> anyhow::Result<()> {
        let decision = self.executor.authorize(tool_name, input).await;
        let reply = if decision.is_granted() {
            protocol::allow_response(request_id, input)
        } else {
            protocol::deny_response(request_id, "Permission denied")
        };
        self.write(&reply).await
    }
}

/// One turn of the managed client for the message last sent
fn run_turn(shared: Arc<ManagedShared>) -> impl futures::Stream<Item = NormalizedEvent> + Send {
    stream! {
        let started = Instant::now();
        yield NormalizedEvent::ModelInfo { model: shared.model.clone() };

        if !shared.awaiting_turn.swap(false, Ordering::SeqCst) {
            yield NormalizedEvent::error("No message to respond to: call send() first");
            return;
        }

        let mut reader = shared.reader.lock().await;
        let mut text = String::new();
        let mut turns: u32 = 0;

        loop {
            let line = match reader.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    tracing::error!("[Managed] Client exited mid-turn");
                    yield NormalizedEvent::error("managed client exited before the turn finished");
                    return;
                }
                Err(e) => {
                    tracing::error!("[Managed] Read failed: {:#}", e);
                    yield NormalizedEvent::error(format!("managed client read failed: {:#}", e));
                    return;
                }
            };

            let Some(message) = protocol::parse_line(&line) else {
                continue;
            };

            match message {
                CliMessage::System { subtype, session_id, .. } => {
                    if subtype == "init" {
                        if let Some(id) = session_id {
                            tracing::debug!("[Managed] Session {}", id);
                            *shared.session_id.lock() = Some(id);
                        }
                    }
                }
                CliMessage::Assistant { message } => {
                    turns += 1;
                    for block in message.content {
                        match block {
                            CliContent::Text { text: fragment } => {
                                text.push_str(&fragment);
                                yield NormalizedEvent::text(fragment);
                            }
                            CliContent::ToolUse { id, name, input } => {
                                yield NormalizedEvent::ToolUse { name, id, input };
                            }
                            _ => {}
                        }
                    }
                }
                CliMessage::User { message } => {
                    for block in message.content {
                        if let CliContent::ToolResult { tool_use_id, content, is_error } = block {
                            yield NormalizedEvent::ToolResult {
                                tool_use_id,
                                content: protocol::tool_result_text(&content),
                                is_error: is_error.unwrap_or(false),
                            };
                        }
                    }
                }
                CliMessage::ControlRequest { request_id, request } => {
                    let reply = if request.subtype == "can_use_tool" {
                        let tool_name = request.tool_name.unwrap_or_default();
                        let input = request.input.unwrap_or_else(|| serde_json::json!({}));
                        shared.answer_permission(&request_id, &tool_name, &input).await
                    } else {
                        tracing::warn!("[Managed] Unsupported control request: {}", request.subtype);
                        shared
                            .write(&protocol::error_response(
                                &request_id,
                                &format!("unsupported control request: {}", request.subtype),
                            ))
                            .await
                    };
                    if let Err(e) = reply {
                        tracing::error!("[Managed] Could not answer control request: {:#}", e);
                        yield NormalizedEvent::error(format!("managed client write failed: {:#}", e));
                        return;
                    }
                }
                CliMessage::ControlResponse { response } => {
                    tracing::debug!("[Managed] Control response {} ({})", response.request_id, response.subtype);
                }
                CliMessage::Result {
                    result,
                    session_id,
                    total_cost_usd,
                    duration_ms,
                    num_turns,
                    is_error,
                    usage,
                    ..
                } => {
                    if shared.interrupted.swap(false, Ordering::SeqCst) {
                        yield NormalizedEvent::status("interrupted");
                    }

                    let usage: Usage = usage.map(Usage::from).unwrap_or_default();
                    let session_id = match session_id {
                        Some(id) => {
                            *shared.session_id.lock() = Some(id.clone());
                            Some(id)
                        }
                        None => shared.session_id.lock().clone(),
                    };

                    yield NormalizedEvent::Result(ResultPayload {
                        text: result.filter(|r| !r.is_empty()).unwrap_or(text),
                        session_id,
                        cost_usd: total_cost_usd
                            .unwrap_or_else(|| shared.prices.cost(&shared.model, &usage)),
                        duration_ms: duration_ms
                            .unwrap_or_else(|| started.elapsed().as_millis() as u64),
                        num_turns: num_turns.unwrap_or(turns),
                        is_error,
                        usage,
                    });
                    return;
                }
                CliMessage::Unknown => {}
            }
        }
    }
}

/// Provider for Claude through the managed CLI client
pub struct ManagedProvider {
    connector: Arc<dyn ManagedConnector>,
    shared: Option<Arc<ManagedShared>>,
}

impl ManagedProvider {
    pub fn new() -> Self {
        Self::with_connector(Arc::new(ClaudeCliConnector::from_env()))
    }

    /// Use a custom way of starting the client
    pub fn with_connector(connector: Arc<dyn ManagedConnector>) -> Self {
        Self {
            connector,
            shared: None,
        }
    }

    /// Servers the running client actually has
    pub fn active_servers(&self) -> Vec<String> {
        self.shared
            .as_ref()
            .map(|s| s.active_servers.iter().map(|c| c.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Backend session id, known after the first turn
    pub fn session_id(&self) -> Option<String> {
        self.shared.as_ref().and_then(|s| s.session_id.lock().clone())
    }

    fn shared(&self) -> FrameworkResult<&Arc<ManagedShared>> {
        self.shared.as_ref().ok_or(FrameworkError::NotInitialized)
    }
}

impl Default for ManagedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for ManagedProvider {
    async fn initialize(&mut self, config: ProviderConfig) -> FrameworkResult<()> {
        if self.shared.is_some() {
            return Err(FrameworkError::AlreadyInitialized);
        }

        config.credentials.validate(ProviderKind::Claude)?;
        let executor = config.build_executor()?;

        let base = LaunchOptions {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            working_dir: config.working_dir.clone(),
            resume_id: config.resume_id.clone(),
            aux_servers: Vec::new(),
            api_key: config.credentials.api_key.clone(),
        };

        let connector = self.connector.clone();
        let connected = connect_with_degradation(&config.aux_servers, &config.aux_status, |servers| {
            let connector = connector.clone();
            let options = LaunchOptions {
                aux_servers: servers,
                ..base.clone()
            };
            async move {
                let mut session = connector.connect(&options).await?;
                if let Err(e) = session.handshake(&options.aux_servers).await {
                    session.close().await;
                    return Err(e);
                }
                Ok(session)
            }
        })
        .await
        .map_err(|e| FrameworkError::backend(format!("managed client failed to start: {:#}", e)))?;

        for server in &connected.active {
            executor
                .classifier()
                .register_extension_prefix(server.managed_prefix(), server.permission);
        }

        tracing::info!(
            "[{}] Initialized agent {} with model {} ({}/{} auxiliary servers)",
            ProviderKind::Claude,
            config.agent_id,
            config.model,
            connected.active.len(),
            config.aux_servers.len()
        );

        let (reader, writer) = connected.session.split();
        self.shared = Some(Arc::new(ManagedShared {
            executor: Arc::new(executor),
            model: config.model,
            prices: config.prices,
            reader: tokio::sync::Mutex::new(reader),
            writer: tokio::sync::Mutex::new(writer),
            session_id: Mutex::new(config.resume_id),
            active_servers: connected.active,
            awaiting_turn: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
        }));

        Ok(())
    }

    async fn send(&self, text: &str, images: Vec<ImageInput>) -> FrameworkResult<()> {
        let shared = self.shared()?;
        if shared.disconnected.load(Ordering::SeqCst) {
            return Err(FrameworkError::NotInitialized);
        }

        shared
            .write(&protocol::user_message(text, &images))
            .await
            .map_err(FrameworkError::backend)?;
        shared.interrupted.store(false, Ordering::SeqCst);
        shared.awaiting_turn.store(true, Ordering::SeqCst);
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
        let Some(shared) = &self.shared else {
            return;
        };
        if shared.disconnected.load(Ordering::SeqCst) {
            return;
        }

        shared.interrupted.store(true, Ordering::SeqCst);
        let request_id = format!("req_{}", uuid::Uuid::new_v4().simple());
        let request = protocol::control_request(&request_id, serde_json::json!({ "subtype": "interrupt" }));
        if let Err(e) = shared.write(&request).await {
            tracing::warn!("[Managed] Interrupt request failed: {:#}", e);
        }
    }

    async fn disconnect(&self) {
        let Some(shared) = &self.shared else {
            return;
        };
        if shared.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }

        shared.writer.lock().await.close().await;
        tracing::info!("[{}] Disconnected", ProviderKind::Claude);
    }

    fn supports_resumption(&self) -> bool {
        true
    }

    fn supports_screen_control(&self) -> bool {
        true
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }
}
