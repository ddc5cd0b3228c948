//! Glob tool for file pattern matching

use anyhow::Result;
use async_trait::async_trait;
use glob::glob;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;

use crate::tools::sandbox::Sandbox;
use crate::tools::tool::{Tool, ToolResult};

/// Maximum number of paths returned
const MAX_RESULTS: usize = 500;

/// Glob tool for file pattern matching
pub struct GlobTool {
    sandbox: Sandbox,
}

#[derive(Debug, Deserialize)]
struct GlobInput {
    pattern: String,
    /// Directory to search in (defaults to the sandbox root)
    path: Option<String>,
}

impl GlobTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    /// Matching files, most recently modified first
    fn search(&self, input: &GlobInput) -> Result<Vec<String>> {
        if Path::new(&input.pattern).is_absolute() || input.pattern.contains("..") {
            anyhow::bail!("Pattern must be relative to the search directory");
        }

        let base = match &input.path {
            Some(path) => self.sandbox.resolve(path)?,
            None => self.sandbox.root().to_path_buf(),
        };
        let full_pattern = format!("{}/{}", base.display(), input.pattern);
        tracing::info!("[Glob] Searching with pattern: {}", full_pattern);

        let mut entries: Vec<(String, std::time::SystemTime)> = glob(&full_pattern)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file() && self.sandbox.contains(path))
            .filter_map(|path| {
                let mtime = path.metadata().ok()?.modified().ok()?;
                let display = self.sandbox.relative(&path).to_string_lossy().to_string();
                Some((display, mtime))
            })
            .collect();

        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(entries.into_iter().map(|(path, _)| path).collect())
    }
}

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "Glob"
    }

    fn description(&self) -> &str {
        "Fast file pattern matching. Supports glob patterns like \"**/*.rs\" or \"src/**/*.ts\". \
        Returns matching file paths sorted by modification time."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The glob pattern to match files against"
                },
                "path": {
                    "type": "string",
                    "description": "The directory to search in. Defaults to the workspace root."
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let input: GlobInput = serde_json::from_value(input.clone())
            .map_err(|e| anyhow::anyhow!("Invalid glob input: {}", e))?;

        match self.search(&input) {
            Ok(paths) if paths.is_empty() => Ok(ToolResult::success(format!(
                "No files found matching pattern: {}",
                input.pattern
            ))),
            Ok(paths) => {
                let total = paths.len();
                let mut output = paths
                    .into_iter()
                    .take(MAX_RESULTS)
                    .collect::<Vec<_>>()
                    .join("\n");
                if total > MAX_RESULTS {
                    output.push_str(&format!("\n... ({} more files)", total - MAX_RESULTS));
                }
                Ok(ToolResult::success(output))
            }
            Err(e) => Ok(ToolResult::error(format!("Glob failed: {:#}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recursive_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/sub")).unwrap();
        std::fs::write(dir.path().join("src/a.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/sub/b.rs"), "").unwrap();
        std::fs::write(dir.path().join("notes.md"), "").unwrap();
        let tool = GlobTool::new(Sandbox::new(dir.path()).unwrap());

        let result = tool.execute(&json!({ "pattern": "**/*.rs" })).await.unwrap();
        assert!(!result.is_error);
        assert!(result.content.contains("src/a.rs"));
        assert!(result.content.contains("src/sub/b.rs"));
        assert!(!result.content.contains("notes.md"));
    }

    #[tokio::test]
    async fn test_rejects_escaping_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let tool = GlobTool::new(Sandbox::new(dir.path()).unwrap());

        let result = tool.execute(&json!({ "pattern": "../*" })).await.unwrap();
        assert!(result.is_error);
        let result = tool
            .execute(&json!({ "pattern": "*", "path": "/" }))
            .await
            .unwrap();
        assert!(result.is_error);
    }
}
