//! Built-in tools
//!
//! Standard sandboxed tools every agent gets:
//! - `BashTool` - Execute shell commands in the workspace
//! - `ReadTool` - Read file contents
//! - `WriteTool` - Write files
//! - `EditTool` - Edit files with string replacement
//! - `GlobTool` - Find files by pattern
//! - `GrepTool` - Search file contents

use std::sync::Arc;

use super::sandbox::Sandbox;
use super::tool::Tool;

pub mod bash;
pub mod edit_tool;
pub mod glob_tool;
pub mod grep_tool;
pub mod read_tool;
pub mod write_tool;

pub use bash::BashTool;
pub use edit_tool::EditTool;
pub use glob_tool::GlobTool;
pub use grep_tool::GrepTool;
pub use read_tool::ReadTool;
pub use write_tool::WriteTool;

/// All built-in tools confined to `sandbox`
pub fn builtin_tools(sandbox: &Sandbox) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(BashTool::new(sandbox.clone())),
        Arc::new(ReadTool::new(sandbox.clone())),
        Arc::new(WriteTool::new(sandbox.clone())),
        Arc::new(EditTool::new(sandbox.clone())),
        Arc::new(GlobTool::new(sandbox.clone())),
        Arc::new(GrepTool::new(sandbox.clone())),
    ]
}
