//! Write tool for creating/overwriting files inside the sandbox

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::sandbox::Sandbox;
use crate::tools::tool::{Tool, ToolResult};

/// Write tool for creating files
pub struct WriteTool {
    sandbox: Sandbox,
}

#[derive(Debug, Deserialize)]
struct WriteInput {
    file_path: String,
    content: String,
}

impl WriteTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    async fn write_file(&self, input: &WriteInput) -> Result<String> {
        let path = self.sandbox.resolve(&input.file_path)?;
        tracing::info!("[Write] Writing file: {}", path.display());

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let existed = tokio::fs::try_exists(&path).await.unwrap_or(false);

        tokio::fs::write(&path, &input.content)
            .await
            .with_context(|| format!("Failed to write file: {}", input.file_path))?;

        if existed {
            Ok(format!("File updated successfully: {}", input.file_path))
        } else {
            Ok(format!("File created successfully: {}", input.file_path))
        }
    }
}

#[async_trait]
impl Tool for WriteTool {
    fn name(&self) -> &str {
        "Write"
    }

    fn description(&self) -> &str {
        "Writes a file in the workspace, creating parent directories and overwriting any existing file."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to write"
                },
                "content": {
                    "type": "string",
                    "description": "The content to write to the file"
                }
            },
            "required": ["file_path", "content"]
        })
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let input: WriteInput = serde_json::from_value(input.clone())
            .map_err(|e| anyhow::anyhow!("Invalid write input: {}", e))?;

        match self.write_file(&input).await {
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => Ok(ToolResult::error(format!("{:#}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_then_update() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteTool::new(Sandbox::new(dir.path()).unwrap());

        let input = json!({ "file_path": "nested/out.txt", "content": "hello" });
        let result = tool.execute(&input).await.unwrap();
        assert!(result.content.contains("created"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("nested/out.txt")).unwrap(),
            "hello"
        );

        let result = tool.execute(&input).await.unwrap();
        assert!(result.content.contains("updated"));
    }

    #[tokio::test]
    async fn test_refuses_outside_sandbox() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteTool::new(Sandbox::new(dir.path()).unwrap());

        let result = tool
            .execute(&json!({ "file_path": "../escape.txt", "content": "x" }))
            .await
            .unwrap();
        assert!(result.is_error);
        assert!(!dir.path().parent().unwrap().join("escape.txt").exists());
    }
}
