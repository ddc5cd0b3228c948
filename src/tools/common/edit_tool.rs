//! Edit tool for modifying files
//!
//! Performs exact string replacements in files inside the sandbox.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::sandbox::Sandbox;
use crate::tools::tool::{Tool, ToolResult};

/// Edit tool for string replacement in files
pub struct EditTool {
    sandbox: Sandbox,
}

#[derive(Debug, Deserialize)]
struct EditInput {
    file_path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

impl EditTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    async fn str_replace(&self, input: &EditInput) -> Result<String> {
        let path = self.sandbox.resolve(&input.file_path)?;
        tracing::info!("[Edit] Editing file: {}", path.display());

        if input.old_string.is_empty() {
            anyhow::bail!("old_string must not be empty");
        }
        if input.old_string == input.new_string {
            anyhow::bail!("old_string and new_string must be different");
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read file: {}", input.file_path))?;

        let occurrences = content.matches(input.old_string.as_str()).count();

        if occurrences == 0 {
            anyhow::bail!(
                "String not found in file. Make sure to include exact text including whitespace."
            );
        }

        if !input.replace_all && occurrences > 1 {
            anyhow::bail!(
                "Found {} occurrences of the string. Either provide a more specific string \
                to ensure only one match, or use replace_all: true to change every instance.",
                occurrences
            );
        }

        let new_content = if input.replace_all {
            content.replace(&input.old_string, &input.new_string)
        } else {
            content.replacen(&input.old_string, &input.new_string, 1)
        };

        tokio::fs::write(&path, &new_content)
            .await
            .with_context(|| format!("Failed to write file: {}", input.file_path))?;

        if input.replace_all {
            Ok(format!(
                "Successfully replaced {} occurrences in {}",
                occurrences, input.file_path
            ))
        } else {
            Ok(format!("Successfully replaced text in {}", input.file_path))
        }
    }
}

#[async_trait]
impl Tool for EditTool {
    fn name(&self) -> &str {
        "Edit"
    }

    fn description(&self) -> &str {
        "Performs an exact string replacement in a workspace file. old_string must be unique \
        unless replace_all is set."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to modify"
                },
                "old_string": {
                    "type": "string",
                    "description": "The text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The text to replace it with"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace all occurrences (default false)"
                }
            },
            "required": ["file_path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let input: EditInput = serde_json::from_value(input.clone())
            .map_err(|e| anyhow::anyhow!("Invalid edit input: {}", e))?;

        match self.str_replace(&input).await {
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => Ok(ToolResult::error(format!("{:#}", e))),
        }
    }
}
