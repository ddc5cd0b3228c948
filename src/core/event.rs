//! Normalized events streamed FROM a provider
//!
//! Every backend translates its own wire format into these variants, so
//! front-ends only ever see one shape:
//!
//! ```json
//! {"type": "tool_use", "name": "Bash", "id": "call_1", "input": {"command": "ls"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::Usage;

/// Payload of the final `result` event of a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    /// Accumulated assistant text
    pub text: String,
    /// Backend session identifier (only for backends that support resumption)
    pub session_id: Option<String>,
    /// Cost in USD
    pub cost_usd: f64,
    /// Wall-clock duration of the stream
    pub duration_ms: u64,
    /// Number of model turns taken
    pub num_turns: u32,
    /// Whether the run ended in an error state
    pub is_error: bool,
    /// Token usage across all turns
    pub usage: Usage,
}

/// Uniform event emitted by every provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NormalizedEvent {
    /// Model serving this stream
    ModelInfo {
        /// Model name
        model: String,
    },

    /// Incremental assistant text
    AssistantText {
        /// Text fragment
        text: String,
    },

    /// Model requested a tool call
    ToolUse {
        /// Tool name
        name: String,
        /// Call id
        id: String,
        /// Tool input
        input: Value,
    },

    /// Result of a tool call
    ToolResult {
        /// Call id this result answers
        tool_use_id: String,
        /// Result text
        content: String,
        /// Whether the tool failed or was denied
        is_error: bool,
    },

    /// Final result of the stream
    Result(ResultPayload),

    /// Status update (progress, truncation, interruption)
    Status {
        /// Free text
        message: String,
    },

    /// Error that ended the stream
    Error {
        /// Free text
        message: String,
    },
}

impl NormalizedEvent {
    /// Create an assistant text event
    pub fn text(text: impl Into<String>) -> Self {
        NormalizedEvent::AssistantText { text: text.into() }
    }

    /// Create a status event
    pub fn status(message: impl Into<String>) -> Self {
        NormalizedEvent::Status {
            message: message.into(),
        }
    }

    /// Create an error event
    pub fn error(message: impl Into<String>) -> Self {
        NormalizedEvent::Error {
            message: message.into(),
        }
    }

    /// Check if this event ends a stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, NormalizedEvent::Result(_) | NormalizedEvent::Error { .. })
    }

    /// Wire name of this event kind
    pub fn kind(&self) -> &'static str {
        match self {
            NormalizedEvent::ModelInfo { .. } => "model_info",
            NormalizedEvent::AssistantText { .. } => "assistant_text",
            NormalizedEvent::ToolUse { .. } => "tool_use",
            NormalizedEvent::ToolResult { .. } => "tool_result",
            NormalizedEvent::Result(_) => "result",
            NormalizedEvent::Status { .. } => "status",
            NormalizedEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_checks() {
        assert!(NormalizedEvent::error("boom").is_terminal());
        assert!(!NormalizedEvent::text("hi").is_terminal());
        assert!(!NormalizedEvent::status("working").is_terminal());
    }

    #[test]
    fn test_wire_shape() {
        let event = NormalizedEvent::ToolUse {
            name: "Bash".into(),
            id: "call_1".into(),
            input: json!({"command": "ls"}),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "tool_use");
        assert_eq!(value["input"]["command"], "ls");

        let result = NormalizedEvent::Result(ResultPayload {
            text: "done".into(),
            session_id: None,
            cost_usd: 0.0,
            duration_ms: 12,
            num_turns: 1,
            is_error: false,
            usage: Usage::default(),
        });
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["type"], "result");
        assert_eq!(value["usage"]["input_tokens"], 0);
        assert_eq!(result.kind(), "result");
    }
}
