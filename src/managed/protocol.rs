//! stream-json line protocol of the managed CLI client
//!
//! One JSON object per line in both directions. Incoming lines we care about:
//!
//! - `system` (subtype `init`): session id, model, tools, server status
//! - `assistant`: text and `tool_use` blocks
//! - `user`: `tool_result` blocks for tools the client ran itself
//! - `result`: end of the turn, with cost and usage
//! - `control_request`: the client asking us something (`can_use_tool`)
//! - `control_response`: answers to our own control requests
//!
//! Anything else is skipped.

use serde::Deserialize;
use serde_json::{json, Value};

use crate::llm::{ImageInput, Usage};

/// Content block inside an `assistant` / `user` message
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CliContent {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Value,
        #[serde(default)]
        is_error: Option<bool>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CliMessageBody {
    #[serde(default, deserialize_with = "content_list")]
    pub content: Vec<CliContent>,
}

/// `content` may be a plain string or a list of blocks
fn content_list<'de, D>(deserializer: D) -> Result<Vec<CliContent>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(text) => vec![CliContent::Text { text }],
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or(CliContent::Other))
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

impl From<CliUsage> for Usage {
    fn from(usage: CliUsage) -> Self {
        Usage::new(
            usage.input_tokens + usage.cache_creation_input_tokens + usage.cache_read_input_tokens,
            usage.output_tokens,
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CliServerStatus {
    pub name: String,
    pub status: String,
}

/// Body of a `control_request` sent by the client
#[derive(Debug, Clone, Deserialize)]
pub struct ControlRequestBody {
    pub subtype: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub input: Option<Value>,
}

/// Body of a `control_response` answering one of our requests
#[derive(Debug, Clone, Deserialize)]
pub struct ControlResponseBody {
    pub subtype: String,
    pub request_id: String,
    #[serde(default)]
    pub response: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One incoming line
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CliMessage {
    System {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        model: Option<String>,
        #[serde(default)]
        tools: Vec<String>,
        #[serde(default)]
        mcp_servers: Vec<CliServerStatus>,
    },
    Assistant {
        message: CliMessageBody,
    },
    User {
        message: CliMessageBody,
    },
    Result {
        #[serde(default)]
        subtype: String,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        total_cost_usd: Option<f64>,
        #[serde(default)]
        duration_ms: Option<u64>,
        #[serde(default)]
        num_turns: Option<u32>,
        #[serde(default)]
        is_error: bool,
        #[serde(default)]
        usage: Option<CliUsage>,
    },
    ControlRequest {
        request_id: String,
        request: ControlRequestBody,
    },
    ControlResponse {
        response: ControlResponseBody,
    },
    #[serde(other)]
    Unknown,
}

/// Parse one line; malformed lines are logged and skipped
pub fn parse_line(line: &str) -> Option<CliMessage> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::warn!("[Managed] Skipping malformed line ({}): {}", e, truncate(line, 200));
            None
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Flatten a `tool_result` content value into text
pub fn tool_result_text(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// A user turn (images first, then text)
pub fn user_message(text: &str, images: &[ImageInput]) -> Value {
    let mut content: Vec<Value> = images
        .iter()
        .map(|image| {
            json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": image.media_type,
                    "data": image.data,
                }
            })
        })
        .collect();
    content.push(json!({ "type": "text", "text": text }));

    json!({
        "type": "user",
        "message": { "role": "user", "content": content },
    })
}

/// A control request we send to the client
pub fn control_request(request_id: &str, request: Value) -> Value {
    json!({
        "type": "control_request",
        "request_id": request_id,
        "request": request,
    })
}

/// Permission granted for a `can_use_tool` request
pub fn allow_response(request_id: &str, input: &Value) -> Value {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "success",
            "request_id": request_id,
            "response": { "behavior": "allow", "updatedInput": input },
        }
    })
}

/// Permission denied for a `can_use_tool` request
pub fn deny_response(request_id: &str, message: &str) -> Value {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "success",
            "request_id": request_id,
            "response": { "behavior": "deny", "message": message },
        }
    })
}

/// Error answer to a control request we don't handle
pub fn error_response(request_id: &str, error: &str) -> Value {
    json!({
        "type": "control_response",
        "response": {
            "subtype": "error",
            "request_id": request_id,
            "error": error,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_assistant_blocks() {
        let line = r#"{"type":"assistant","message":{"content":[
            {"type":"text","text":"hi"},
            {"type":"tool_use","id":"t1","name":"Bash","input":{"command":"ls"}},
            {"type":"thinking","thinking":"..."}]}}"#;
        let Some(CliMessage::Assistant { message }) = parse_line(line) else {
            panic!("expected assistant");
        };
        assert_eq!(message.content.len(), 3);
        assert!(matches!(&message.content[1], CliContent::ToolUse { name, .. } if name == "Bash"));
        assert!(matches!(message.content[2], CliContent::Other));
    }

    #[test]
    fn test_parse_result_and_control() {
        let line = r#"{"type":"result","subtype":"success","result":"ok","session_id":"s1",
            "total_cost_usd":0.01,"duration_ms":1200,"num_turns":2,"is_error":false,
            "usage":{"input_tokens":10,"cache_read_input_tokens":5,"output_tokens":3}}"#;
        let Some(CliMessage::Result { usage, total_cost_usd, .. }) = parse_line(line) else {
            panic!("expected result");
        };
        assert_eq!(Usage::from(usage.unwrap()), Usage::new(15, 3));
        assert_eq!(total_cost_usd, Some(0.01));

        let line = r#"{"type":"control_request","request_id":"r1",
            "request":{"subtype":"can_use_tool","tool_name":"Write","input":{"file_path":"a"}}}"#;
        assert!(matches!(
            parse_line(line),
            Some(CliMessage::ControlRequest { request, .. }) if request.tool_name.as_deref() == Some("Write")
        ));
    }

    #[test]
    fn test_unknown_and_malformed_lines() {
        assert!(matches!(
            parse_line(r#"{"type":"stream_event","event":{}}"#),
            Some(CliMessage::Unknown)
        ));
        assert!(parse_line("not json at all").is_none());
        assert!(parse_line("   ").is_none());
    }

    #[test]
    fn test_outgoing_shapes() {
        let msg = user_message("look", &[ImageInput::base64("image/png", "AAAA")]);
        assert_eq!(msg["message"]["content"][0]["source"]["media_type"], "image/png");
        assert_eq!(msg["message"]["content"][1]["text"], "look");

        let allow = allow_response("r1", &json!({ "a": 1 }));
        assert_eq!(allow["response"]["response"]["behavior"], "allow");
        assert_eq!(allow["response"]["response"]["updatedInput"]["a"], 1);

        let deny = deny_response("r2", "no");
        assert_eq!(deny["response"]["response"]["behavior"], "deny");

        assert_eq!(
            tool_result_text(&json!([{ "type": "text", "text": "a" }, { "type": "text", "text": "b" }])),
            "a\nb"
        );
    }
}
