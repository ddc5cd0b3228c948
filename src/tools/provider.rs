//! Tool Provider trait
//!
//! Abstraction for dynamic tool sources (auxiliary MCP servers, plugins)

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use super::tool::Tool;

/// Trait for dynamic tool providers
///
/// Providers fetch tools from external sources and expose them as `Tool`
/// implementations. The registry re-fetches from every provider on reload.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Get all tools from this provider
    async fn get_tools(&self) -> Result<Vec<Arc<dyn Tool>>>;

    /// Re-fetch the tool list from the source
    ///
    /// Static providers keep the default no-op.
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }

    /// Provider name for logging and debugging
    fn name(&self) -> &str;
}
