//! Tool trait definition
//!
//! All tool handlers implement this trait: one async `execute` taking the
//! JSON arguments and returning `{content, is_error}`.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::ToolDefinition;
use crate::permissions::PermissionLevel;

/// Argument key carrying the calling agent's id (injected by the executor)
pub const AGENT_ID_FIELD: &str = "_agent_id";

/// Argument key carrying the owning user's id (injected by the executor)
pub const USER_ID_FIELD: &str = "_user_id";

/// Result of executing a tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The output of the tool
    pub content: String,
    /// Whether the tool execution resulted in an error
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error tool result
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

/// Trait for tools that the agent can use
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of this tool
    fn name(&self) -> &str;

    /// Get a description of this tool
    fn description(&self) -> &str;

    /// JSON schema of the tool input
    fn input_schema(&self) -> Value;

    /// Get the tool definition advertised to the model
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }

    /// Permission level declared by an extension manifest
    ///
    /// Built-in tools return `None` and are classified by the static tables.
    fn declared_level(&self) -> Option<PermissionLevel> {
        None
    }

    /// Execute the tool with the given input
    ///
    /// The input is a JSON value that matches the tool's input schema, plus
    /// the executor's control fields.
    async fn execute(&self, input: &Value) -> Result<ToolResult>;
}

/// Agent id injected by the executor, if present
pub fn agent_id_of(input: &Value) -> Option<&str> {
    input.get(AGENT_ID_FIELD).and_then(|v| v.as_str())
}

/// User id injected by the executor, if present
pub fn user_id_of(input: &Value) -> Option<&str> {
    input.get(USER_ID_FIELD).and_then(|v| v.as_str())
}

/// Copy of the input without control fields (for forwarding to external servers)
pub fn strip_control_fields(input: &Value) -> Value {
    match input {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| key.as_str() != AGENT_ID_FIELD && key.as_str() != USER_ID_FIELD)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_result_constructors() {
        let result = ToolResult::success("output");
        assert_eq!(result.content, "output");
        assert!(!result.is_error);

        let result = ToolResult::error("error message");
        assert!(result.is_error);
    }

    #[test]
    fn test_control_fields() {
        let input = json!({ "path": "a", "_agent_id": "main/x", "_user_id": "u1" });
        assert_eq!(agent_id_of(&input), Some("main/x"));
        assert_eq!(user_id_of(&input), Some("u1"));
        assert_eq!(strip_control_fields(&input), json!({ "path": "a" }));
    }
}
