//! Grep tool for content search
//!
//! Regex search over files inside the sandbox, optionally filtered by a
//! glob. Binary and unreadable files are skipped.

use anyhow::Result;
use async_trait::async_trait;
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::tools::sandbox::Sandbox;
use crate::tools::tool::{Tool, ToolResult};

/// Default cap on output lines
const DEFAULT_HEAD_LIMIT: usize = 250;

/// Grep tool for content search
pub struct GrepTool {
    sandbox: Sandbox,
}

/// Output mode for grep results
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
enum OutputMode {
    Content,
    #[default]
    FilesWithMatches,
    Count,
}

#[derive(Debug, Deserialize)]
struct GrepInput {
    pattern: String,
    /// File or directory to search in
    path: Option<String>,
    /// Glob pattern to filter files (relative to the search directory)
    glob: Option<String>,
    #[serde(default)]
    output_mode: OutputMode,
    #[serde(rename = "-i", default)]
    case_insensitive: bool,
    head_limit: Option<usize>,
}

impl GrepTool {
    pub fn new(sandbox: Sandbox) -> Self {
        Self { sandbox }
    }

    fn candidate_files(&self, input: &GrepInput) -> Result<Vec<PathBuf>> {
        let base = match &input.path {
            Some(path) => self.sandbox.resolve(path)?,
            None => self.sandbox.root().to_path_buf(),
        };

        if base.is_file() {
            return Ok(vec![base]);
        }
        if !base.is_dir() {
            anyhow::bail!("Path not found: {}", self.sandbox.relative(&base).display());
        }

        let file_glob = input.glob.as_deref().unwrap_or("**/*");
        if file_glob.contains("..") {
            anyhow::bail!("Glob must stay inside the search directory");
        }
        let file_glob = if file_glob.contains('/') {
            file_glob.to_string()
        } else {
            format!("**/{}", file_glob)
        };

        let mut files: Vec<PathBuf> = glob::glob(&format!("{}/{}", base.display(), file_glob))?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file() && self.sandbox.contains(path))
            .collect();
        files.sort();
        Ok(files)
    }

    async fn search(&self, input: &GrepInput) -> Result<String> {
        let regex = RegexBuilder::new(&input.pattern)
            .case_insensitive(input.case_insensitive)
            .build()?;

        tracing::info!("[Grep] Searching for: {}", input.pattern);

        let mut lines: Vec<String> = Vec::new();
        for path in self.candidate_files(input)? {
            let Ok(content) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            let display = self.sandbox.relative(&path).display().to_string();

            match input.output_mode {
                OutputMode::FilesWithMatches => {
                    if regex.is_match(&content) {
                        lines.push(display);
                    }
                }
                OutputMode::Count => {
                    let count = content.lines().filter(|l| regex.is_match(l)).count();
                    if count > 0 {
                        lines.push(format!("{}:{}", display, count));
                    }
                }
                OutputMode::Content => {
                    for (i, line) in content.lines().enumerate() {
                        if regex.is_match(line) {
                            lines.push(format!("{}:{}:{}", display, i + 1, line));
                        }
                    }
                }
            }
        }

        let limit = input.head_limit.unwrap_or(DEFAULT_HEAD_LIMIT);
        let total = lines.len();
        lines.truncate(limit);
        let mut output = lines.join("\n");
        if total > limit {
            output.push_str(&format!("\n... ({} more results)", total - limit));
        }
        Ok(output)
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "Grep"
    }

    fn description(&self) -> &str {
        "Searches file contents with a regular expression. Output modes: 'content' shows matching lines, \
        'files_with_matches' shows only file paths (default), 'count' shows match counts."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The regular expression pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "File or directory to search in. Defaults to the workspace root."
                },
                "glob": {
                    "type": "string",
                    "description": "Glob pattern to filter files (e.g. \"*.rs\")"
                },
                "output_mode": {
                    "type": "string",
                    "enum": ["content", "files_with_matches", "count"]
                },
                "-i": {
                    "type": "boolean",
                    "description": "Case insensitive search"
                },
                "head_limit": {
                    "type": "number",
                    "description": "Limit output to first N lines/entries"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, input: &Value) -> Result<ToolResult> {
        let input: GrepInput = serde_json::from_value(input.clone())
            .map_err(|e| anyhow::anyhow!("Invalid grep input: {}", e))?;

        match self.search(&input).await {
            Ok(output) if output.is_empty() => Ok(ToolResult::success(format!(
                "No matches found for pattern: {}",
                input.pattern
            ))),
            Ok(output) => Ok(ToolResult::success(output)),
            Err(e) => Ok(ToolResult::error(format!("Search failed: {:#}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> (tempfile::TempDir, GrepTool) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn alpha() {}\nfn beta() {}\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "Alpha release\n").unwrap();
        let tool = GrepTool::new(Sandbox::new(dir.path()).unwrap());
        (dir, tool)
    }

    #[tokio::test]
    async fn test_output_modes() {
        let (_dir, tool) = workspace();

        let files = tool.execute(&json!({ "pattern": "alpha" })).await.unwrap();
        assert_eq!(files.content, "src/lib.rs");

        let content = tool
            .execute(&json!({ "pattern": "fn \\w+", "output_mode": "content" }))
            .await
            .unwrap();
        assert!(content.content.contains("src/lib.rs:2:fn beta() {}"));

        let count = tool
            .execute(&json!({ "pattern": "alpha", "-i": true, "output_mode": "count" }))
            .await
            .unwrap();
        assert!(count.content.contains("README.md:1"));
        assert!(count.content.contains("src/lib.rs:1"));
    }

    #[tokio::test]
    async fn test_glob_filter_and_no_match() {
        let (_dir, tool) = workspace();

        let result = tool
            .execute(&json!({ "pattern": "Alpha", "glob": "*.rs" }))
            .await
            .unwrap();
        assert!(result.content.starts_with("No matches"));

        let result = tool.execute(&json!({ "pattern": "(" })).await.unwrap();
        assert!(result.is_error);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_skips_files_behind_links_out_of_root() {
        let (dir, tool) = workspace();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "alpha TOP SECRET\n").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();

        let result = tool
            .execute(&json!({ "pattern": "alpha", "output_mode": "content" }))
            .await
            .unwrap();
        assert!(!result.content.contains("TOP SECRET"));
        assert!(result.content.contains("src/lib.rs"));
    }
}
