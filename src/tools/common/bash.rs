//! Bash tool for executing shell commands
//!
//! Commands run with the sandbox root as working directory and an optional
//! timeout. Destructive commands are caught earlier by the classifier.

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

use crate::tools::sandbox::Sandbox;
use crate::tools::tool::{Tool, ToolResult};

/// Default timeout in milliseconds (2 minutes)
const DEFAULT_TIMEOUT_MS: u64 = 120_000;
/// Maximum timeout in milliseconds (10 minutes)
const MAX_TIMEOUT_MS: u64 = 600_000;
/// Maximum output length in bytes
const MAX_OUTPUT_LENGTH: usize = 30_000;

/// Bash tool for executing shell commands
pub struct BashTool {
    sandbox: Sandbox,
}

#[derive(Debug, Deserialize)]
struct BashInput {
    command: String,
    /// Optional timeout in milliseconds
    timeout: Option<u64>,
    description: Option<String>,
}

impl BashTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    async fn run_command(&self, command: &str, timeout_ms: u64) -> Result<(String, i32)> {
        tracing::info!("[Bash] Executing: {}", command);
        tracing::debug!("[Bash] Working directory: {}", self.sandbox.root().display());

        let timeout_ms = timeout_ms.min(MAX_TIMEOUT_MS);

        let output_future = Command::new("bash")
            .arg("-c")
            .arg(command)
            .current_dir(self.sandbox.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match timeout(Duration::from_millis(timeout_ms), output_future).await {
            Ok(result) => result?,
            Err(_) => {
                return Ok((format!("Command timed out after {}ms", timeout_ms), -1));
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        let mut result = String::new();
        if !stdout.is_empty() {
            result.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str("STDERR:\n");
            result.push_str(&stderr);
        }

        if result.len() > MAX_OUTPUT_LENGTH {
            let mut cut = MAX_OUTPUT_LENGTH;
            while !result.is_char_boundary(cut) {
                cut -= 1;
            }
            result.truncate(cut);
            result.push_str("\n... (output truncated)");
        }

        tracing::debug!("[Bash] Exit code: {}", exit_code);
        Ok((result, exit_code))
    }
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "Bash"
    }

    fn description(&self) -> &str {
        "Executes a bash command in the workspace directory with an optional timeout. \
        Use for terminal operations like git, npm or cargo; use the file tools for reading and editing files."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The command to execute"
                },
                "timeout": {
                    "type": "number",
                    "description": "Optional timeout in milliseconds (max 600000, default 120000)"
                },
                "description": {
                    "type": "string",
                    "description": "Short description of what this command does"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let input: BashInput = serde_json::from_value(input.clone())
            .map_err(|e| anyhow::anyhow!("Invalid bash input: {}", e))?;

        if let Some(desc) = &input.description {
            tracing::info!("[Bash] Description: {}", desc);
        }

        if input.command.trim().is_empty() {
            return Ok(ToolResult::success("No command given (nothing to do)"));
        }

        let timeout_ms = input.timeout.unwrap_or(DEFAULT_TIMEOUT_MS);

        match self.run_command(&input.command, timeout_ms).await {
            Ok((output, 0)) if output.is_empty() => Ok(ToolResult::success(
                "Command completed successfully (no output)",
            )),
            Ok((output, 0)) => Ok(ToolResult::success(output)),
            Ok((output, exit_code)) => Ok(ToolResult::error(format!(
                "Command failed with exit code {}\n{}",
                exit_code, output
            ))),
            Err(e) => Ok(ToolResult::error(format!("Failed to execute command: {}", e))),
        }
    }
}
