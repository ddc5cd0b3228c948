//! Read tool for reading files
//!
//! Reads files inside the sandbox with `cat -n` style line numbers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::sandbox::Sandbox;
use crate::tools::tool::{Tool, ToolResult};

/// Maximum lines to read by default
const DEFAULT_LINE_LIMIT: usize = 2000;
/// Maximum characters per line before truncation
const MAX_LINE_LENGTH: usize = 2000;

/// Read tool for reading files
pub struct ReadTool {
    sandbox: Sandbox,
}

#[derive(Debug, Deserialize)]
struct ReadInput {
    file_path: String,
    /// 1-indexed first line
    offset: Option<usize>,
    limit: Option<usize>,
}

impl ReadTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    async fn read_file(&self, input: &ReadInput) -> Result<String> {
        let path = self.sandbox.resolve(&input.file_path)?;
        tracing::info!("[Read] Reading file: {}", path.display());

        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read file: {}", input.file_path))?;

        let lines: Vec<&str> = content.lines().collect();
        let total_lines = lines.len();

        let start = input.offset.unwrap_or(1).saturating_sub(1);
        if start > 0 && start >= total_lines {
            return Ok(format!(
                "File has {} lines. Requested offset {} is out of range.",
                total_lines,
                start + 1
            ));
        }
        let end = start
            .saturating_add(input.limit.unwrap_or(DEFAULT_LINE_LIMIT))
            .min(total_lines);

        let mut result = String::new();
        for (i, line) in lines[start..end].iter().enumerate() {
            let display_line: String = if line.chars().count() > MAX_LINE_LENGTH {
                let truncated: String = line.chars().take(MAX_LINE_LENGTH).collect();
                format!("{}...", truncated)
            } else {
                line.to_string()
            };
            result.push_str(&format!("{:>6}\t{}\n", start + i + 1, display_line));
        }

        if end < total_lines {
            result.push_str(&format!(
                "\n... ({} more lines, use offset and limit to read more)\n",
                total_lines - end
            ));
        }

        Ok(result)
    }
}

#[async_trait]
impl Tool for ReadTool {
    fn name(&self) -> &str {
        "Read"
    }

    fn description(&self) -> &str {
        "Reads a file from the workspace. Returns up to 2000 lines with line numbers starting at 1; \
        use offset and limit for long files."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file_path": {
                    "type": "string",
                    "description": "Path of the file to read (relative to the workspace or absolute inside it)"
                },
                "offset": {
                    "type": "number",
                    "description": "The line number to start reading from (1-indexed)"
                },
                "limit": {
                    "type": "number",
                    "description": "The number of lines to read"
                }
            },
            "required": ["file_path"]
        })
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let input: ReadInput = serde_json::from_value(input.clone())
            .map_err(|e| anyhow::anyhow!("Invalid read input: {}", e))?;

        match self.read_file(&input).await {
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => Ok(ToolResult::error(format!("{:#}", e))),
        }
    }
}
