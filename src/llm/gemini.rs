//! Gemini API client
//!
//! Direct HTTP client for `streamGenerateContent`, translating between the
//! engine's conversation types and the Gemini wire format.
//!
//! ```ignore
//! let backend = GeminiBackend::new(Credentials::from_env(ProviderKind::Gemini)?)?;
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

use super::backend::{BackendEvent, BackendStream, ChatBackend, ChatRequest};
use super::credentials::Credentials;
use super::sse;
use super::types::{ContentBlock, Message, Role, ToolDefinition, Usage};
use crate::provider::ProviderKind;

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

// ============================================================================
// Gemini-specific request/response types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiContent {
    role: String,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<GeminiInlineData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

// ============================================================================
// GeminiBackend
// ============================================================================

/// Google Gemini chat backend
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    api_base: String,
}

impl GeminiBackend {
    /// Create a backend; fails if the credentials carry no API key
    pub fn new(credentials: Credentials) -> Result<Self> {
        let api_key = credentials.require_key(ProviderKind::Gemini)?.to_string();
        Ok(Self {
            client: Client::new(),
            api_key,
            api_base: credentials
                .base_url
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        })
    }

    fn build_request(&self, request: &ChatRequest) -> GeminiRequest {
        let system_instruction = (!request.system_prompt.is_empty()).then(|| {
            GeminiSystemInstruction {
                parts: vec![GeminiPart {
                    text: Some(request.system_prompt.clone()),
                    ..Default::default()
                }],
            }
        });

        GeminiRequest {
            contents: convert_messages(&request.messages),
            system_instruction,
            tools: convert_tools(&request.tools),
        }
    }
}

// ============================================================================
// Format conversion
// ============================================================================

/// Convert conversation messages to Gemini contents
///
/// Function responses must name the function, which the conversation only
/// records on the matching tool_use block, so names are looked up by call id
/// across the whole history.
fn convert_messages(messages: &[Message]) -> Vec<GeminiContent> {
    let tool_names: HashMap<&str, &str> = messages
        .iter()
        .flat_map(|m| m.content.iter())
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, .. } => Some((id.as_str(), name.as_str())),
            _ => None,
        })
        .collect();

    let mut contents: Vec<GeminiContent> = Vec::new();

    for message in messages {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "model",
        };

        let parts: Vec<GeminiPart> = message
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } if text.is_empty() => None,
                ContentBlock::Text { text } => Some(GeminiPart {
                    text: Some(text.clone()),
                    ..Default::default()
                }),
                ContentBlock::Image { image } => Some(GeminiPart {
                    inline_data: Some(GeminiInlineData {
                        mime_type: image.media_type.clone(),
                        data: image.data.clone(),
                    }),
                    ..Default::default()
                }),
                ContentBlock::ToolUse { name, input, .. } => Some(GeminiPart {
                    function_call: Some(GeminiFunctionCall {
                        name: name.clone(),
                        args: input.clone(),
                    }),
                    ..Default::default()
                }),
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => {
                    let name = tool_names
                        .get(tool_use_id.as_str())
                        .copied()
                        .unwrap_or(tool_use_id.as_str());
                    let response = if *is_error {
                        json!({ "error": content })
                    } else {
                        json!({ "result": content })
                    };
                    Some(GeminiPart {
                        function_response: Some(GeminiFunctionResponse {
                            name: name.to_string(),
                            response,
                        }),
                        ..Default::default()
                    })
                }
            })
            .collect();

        if parts.is_empty() {
            continue;
        }

        // Gemini requires alternating user/model turns
        match contents.last_mut() {
            Some(last) if last.role == role => last.parts.extend(parts),
            _ => contents.push(GeminiContent {
                role: role.to_string(),
                parts,
            }),
        }
    }

    contents
}

fn convert_tools(tools: &[ToolDefinition]) -> Option<Vec<GeminiTool>> {
    if tools.is_empty() {
        return None;
    }

    let declarations = tools
        .iter()
        .map(|tool| {
            let has_properties = tool
                .input_schema
                .get("properties")
                .and_then(|p| p.as_object())
                .map(|p| !p.is_empty())
                .unwrap_or(false);

            GeminiFunctionDeclaration {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: has_properties.then(|| clean_schema(&tool.input_schema)),
            }
        })
        .collect();

    Some(vec![GeminiTool {
        function_declarations: declarations,
    }])
}

/// Strip JSON Schema keywords Gemini's function declarations reject
fn clean_schema(value: &Value) -> Value {
    const UNSUPPORTED_FIELDS: &[&str] = &[
        "additionalProperties",
        "$schema",
        "definitions",
        "$ref",
        "patternProperties",
        "if",
        "then",
        "else",
        "allOf",
        "anyOf",
        "oneOf",
        "not",
        "default",
    ];

    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !UNSUPPORTED_FIELDS.contains(&key.as_str()))
                .map(|(key, val)| (key.clone(), clean_schema(val)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.iter().map(clean_schema).collect()),
        other => other.clone(),
    }
}

/// Translate one streamed response chunk into backend events.
///
/// Gemini sends each function call whole and without an id, so every call
/// gets the next index and a single complete fragment.
fn chunk_events(response: &GeminiResponse, next_call_index: &mut usize) -> Vec<BackendEvent> {
    let mut events = Vec::new();

    for candidate in response.candidates.iter().flatten() {
        if let Some(content) = &candidate.content {
            for part in &content.parts {
                if let Some(text) = &part.text {
                    if part.thought != Some(true) && !text.is_empty() {
                        events.push(BackendEvent::TextDelta(text.clone()));
                    }
                }
                if let Some(call) = &part.function_call {
                    let args = if call.args.is_null() {
                        json!({})
                    } else {
                        call.args.clone()
                    };
                    events.push(BackendEvent::ToolCallDelta {
                        index: *next_call_index,
                        id: None,
                        name: Some(call.name.clone()),
                        arguments: args.to_string(),
                    });
                    *next_call_index += 1;
                }
            }
        }
        if let Some(reason) = &candidate.finish_reason {
            tracing::debug!("[Gemini] Finish reason: {}", reason);
        }
    }

    events
}

#[async_trait]
impl ChatBackend for GeminiBackend {
    async fn stream_chat(&self, request: ChatRequest) -> Result<BackendStream> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse",
            self.api_base.trim_end_matches('/'),
            request.model
        );

        let body = self.build_request(&request);
        let request_json =
            serde_json::to_string(&body).context("Failed to serialize Gemini streaming request")?;
        tracing::debug!("[Gemini] Streaming request JSON: {}", request_json);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", &self.api_key)
            .body(request_json)
            .send()
            .await
            .context("Failed to send streaming request to Gemini API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            tracing::error!("[Gemini] Streaming API error: {} - {}", status, error_text);
            anyhow::bail!("Gemini API error ({}): {}", status, error_text);
        }

        tracing::info!("[Gemini] Streaming response started");

        let lines = sse::data_lines(sse::body_reader(response));

        let stream = async_stream::try_stream! {
            futures::pin_mut!(lines);
            let mut next_call_index = 0usize;
            let mut usage: Option<Usage> = None;

            while let Some(data) = futures::StreamExt::next(&mut lines).await {
                let data = data?;
                let chunk: GeminiResponse = match serde_json::from_str(&data) {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("[Gemini] Failed to parse streaming chunk: {}", e);
                        continue;
                    }
                };

                // Usage metadata is cumulative; keep the latest
                if let Some(meta) = &chunk.usage_metadata {
                    usage = Some(Usage::new(meta.prompt_token_count, meta.candidates_token_count));
                }

                for event in chunk_events(&chunk, &mut next_call_index) {
                    yield event;
                }
            }

            if let Some(usage) = usage {
                yield BackendEvent::Usage(usage);
            }
            yield BackendEvent::Stop;
        };

        Ok(Box::pin(stream))
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}
