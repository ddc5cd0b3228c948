//! OpenAI-compatible chat completions client
//!
//! Speaks the `/chat/completions` streaming protocol. Also used for Ollama,
//! whose local server exposes the same endpoint under `/v1`.
//!
//! ```ignore
//! let backend = OpenAiBackend::new(Credentials::from_env(ProviderKind::OpenAi)?)?;
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::backend::{BackendEvent, BackendStream, ChatBackend, ChatRequest};
use super::credentials::Credentials;
use super::sse;
use super::types::{ContentBlock, Message, Role, Usage};

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Streaming client for OpenAI-compatible servers
pub struct OpenAiBackend {
    client: Client,
    api_key: Option<String>,
    api_base: String,
    name: &'static str,
}

impl OpenAiBackend {
    /// Client for api.openai.com (or the base URL in the credentials)
    pub fn new(credentials: Credentials) -> Self {
        Self {
            client: Client::new(),
            api_base: credentials
                .base_url
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            api_key: credentials.api_key,
            name: "openai",
        }
    }

    /// Client for a local Ollama server
    pub fn ollama(credentials: Credentials) -> Self {
        Self {
            name: "ollama",
            ..Self::new(Credentials {
                api_key: credentials.api_key,
                base_url: Some(
                    credentials
                        .base_url
                        .unwrap_or_else(|| super::credentials::OLLAMA_DEFAULT_BASE_URL.to_string()),
                ),
            })
        }
    }

    fn build_request(&self, request: &ChatRequest) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system_prompt.is_empty() {
            messages.push(json!({ "role": "system", "content": request.system_prompt }));
        }
        for message in &request.messages {
            messages.extend(convert_message(message));
        }

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        });

        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }

        body
    }
}

/// Convert one conversation message into one or more wire messages.
///
/// Tool results become separate `tool` role messages.
fn convert_message(message: &Message) -> Vec<Value> {
    match message.role {
        Role::Assistant => {
            let text = message.text();
            let tool_calls: Vec<Value> = message
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => Some(json!({
                        "id": id,
                        "type": "function",
                        "function": {
                            "name": name,
                            "arguments": input.to_string(),
                        }
                    })),
                    _ => None,
                })
                .collect();

            let mut out = json!({
                "role": "assistant",
                "content": if text.is_empty() { Value::Null } else { Value::String(text) },
            });
            if !tool_calls.is_empty() {
                out["tool_calls"] = Value::Array(tool_calls);
            }
            vec![out]
        }
        Role::User => {
            let mut out = Vec::new();
            let mut parts = Vec::new();
            let mut has_image = false;

            for block in &message.content {
                match block {
                    ContentBlock::ToolResult {
                        tool_use_id,
                        content,
                        ..
                    } => out.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    })),
                    ContentBlock::Text { text } => {
                        parts.push(json!({ "type": "text", "text": text }));
                    }
                    ContentBlock::Image { image } => {
                        has_image = true;
                        parts.push(json!({
                            "type": "image_url",
                            "image_url": { "url": image.data_url() }
                        }));
                    }
                    ContentBlock::ToolUse { .. } => {}
                }
            }

            if !parts.is_empty() {
                let content = if has_image {
                    Value::Array(parts)
                } else {
                    Value::String(message.text())
                };
                out.push(json!({ "role": "user", "content": content }));
            }
            out
        }
    }
}

// Streaming response types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: usize,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Translate one SSE payload into backend events.
///
/// Returns `None` for payloads that are not valid chunks.
fn parse_chunk(data: &str) -> Option<Vec<BackendEvent>> {
    if data == "[DONE]" {
        return Some(vec![BackendEvent::Stop]);
    }

    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(e) => {
            tracing::warn!("[OpenAI] Failed to parse streaming chunk: {}", e);
            return None;
        }
    };

    let mut events = Vec::new();
    for choice in chunk.choices {
        if let Some(text) = choice.delta.content {
            if !text.is_empty() {
                events.push(BackendEvent::TextDelta(text));
            }
        }
        for call in choice.delta.tool_calls.unwrap_or_default() {
            let (name, arguments) = match call.function {
                Some(f) => (f.name, f.arguments.unwrap_or_default()),
                None => (None, String::new()),
            };
            events.push(BackendEvent::ToolCallDelta {
                index: call.index,
                id: call.id,
                name,
                arguments,
            });
        }
        if let Some(reason) = choice.finish_reason {
            tracing::debug!("[OpenAI] Finish reason: {}", reason);
        }
    }

    if let Some(usage) = chunk.usage {
        events.push(BackendEvent::Usage(Usage::new(
            usage.prompt_tokens,
            usage.completion_tokens,
        )));
    }

    Some(events)
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    async fn stream_chat(&self, request: ChatRequest) -> Result<BackendStream> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let body = self.build_request(&request);
        tracing::debug!("[OpenAI] Request to {}: {}", url, body);

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", self.name))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            tracing::error!("[OpenAI] API error: {} - {}", status, error_text);
            anyhow::bail!("{} API error ({}): {}", self.name, status, error_text);
        }

        let lines = sse::data_lines(sse::body_reader(response));

        let stream = async_stream::try_stream! {
            futures::pin_mut!(lines);
            let mut stopped = false;

            while let Some(data) = futures::StreamExt::next(&mut lines).await {
                let data = data?;
                let Some(events) = parse_chunk(&data) else {
                    continue;
                };
                for event in events {
                    stopped |= event == BackendEvent::Stop;
                    yield event;
                }
                if stopped {
                    break;
                }
            }

            if !stopped {
                yield BackendEvent::Stop;
            }
        };

        Ok(Box::pin(stream))
    }

    fn provider_name(&self) -> &str {
        self.name
    }
}
