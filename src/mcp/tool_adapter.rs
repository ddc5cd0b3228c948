//! Auxiliary Tool Adapter
//!
//! Exposes one tool of an auxiliary server through the `Tool` trait

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::permissions::PermissionLevel;
use crate::tools::{Tool, ToolResult};

use super::server::AuxServer;

/// Adapter that wraps an MCP tool to implement the Tool trait
pub struct AuxToolAdapter {
    server: Arc<AuxServer>,

    /// Original tool name (used when calling the server)
    tool_name: String,

    /// Exposed name with namespace (e.g., "github__create_issue")
    exposed_name: String,

    description: String,
    input_schema: Value,
}

impl AuxToolAdapter {
    pub fn new(server: Arc<AuxServer>, rmcp_tool: rmcp::model::Tool) -> Self {
        let exposed_name = format!("{}__{}", server.name(), rmcp_tool.name);

        Self {
            tool_name: rmcp_tool.name.to_string(),
            exposed_name,
            description: rmcp_tool
                .description
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_else(|| "MCP tool (no description)".to_string()),
            input_schema: Value::Object(rmcp_tool.input_schema.as_ref().clone()),
            server,
        }
    }
}

/// Flatten an rmcp call result into `{content, is_error}`
pub(crate) fn convert_result(result: rmcp::model::CallToolResult) -> Result<ToolResult> {
    use rmcp::model::RawContent;

    let is_error = result.is_error.unwrap_or(false);
    let mut parts = Vec::new();

    for content in result.content {
        match &content.raw {
            RawContent::Text(text) => parts.push(text.text.clone()),
            RawContent::Image(image) => parts.push(format!(
                "[image: {}, {} base64 bytes]",
                image.mime_type,
                image.data.len()
            )),
            RawContent::Resource(resource) => {
                parts.push(serde_json::to_string_pretty(&resource.resource)?)
            }
            _ => parts.push(serde_json::to_string_pretty(&content)?),
        }
    }

    let output = parts.join("\n\n");
    Ok(if is_error {
        ToolResult::error(output)
    } else {
        ToolResult::success(output)
    })
}

#[async_trait]
impl Tool for AuxToolAdapter {
    fn name(&self) -> &str {
        &self.exposed_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    fn declared_level(&self) -> Option<PermissionLevel> {
        Some(self.server.permission())
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        tracing::info!(
            "[AuxTool] Executing '{}' on server '{}'",
            self.tool_name,
            self.server.name()
        );

        let result = self
            .server
            .call_tool(&self.tool_name, input.as_object().cloned())
            .await?;

        convert_result(result)
    }
}
