//! Tool system for the engine
//!
//! This module provides:
//! - `Tool` trait - Interface for implementing tools
//! - `ToolResult` - `{content, is_error}` result of every tool call
//! - `ToolRegistry` - Named handlers with add/replace/remove/reload
//! - `ToolProvider` trait - Interface for dynamic tool sources (MCP, plugins)
//! - `Sandbox` - Root directory file tools are confined to
//! - `common` - Built-in tools (Bash, Read, Write, Edit, Glob, Grep)

mod provider;
mod registry;
mod sandbox;
mod tool;

/// Common/built-in tools
pub mod common;

pub use provider::ToolProvider;
pub use registry::{ReloadFlag, ToolRegistry};
pub use sandbox::Sandbox;
pub use tool::{
    agent_id_of, strip_control_fields, user_id_of, Tool, ToolResult, AGENT_ID_FIELD,
    USER_ID_FIELD,
};

pub use common::{
    builtin_tools, BashTool, EditTool, GlobTool, GrepTool, ReadTool, WriteTool,
};

#[cfg(test)]
pub(crate) use registry::tests::EchoTool;
