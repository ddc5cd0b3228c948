//! Chat backend trait
//!
//! Abstracts one streaming chat-completions endpoint so the generic agentic
//! loop can drive OpenAI-compatible servers, Gemini, or a scripted fake the
//! same way. Backends only translate wire formats; the loop owns tool
//! dispatch, conversation state and result accounting.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

use super::types::{Message, ToolDefinition, Usage};

/// One streamed increment from a backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Assistant text fragment
    TextDelta(String),

    /// Fragment of a tool call, keyed by its position in the response
    ToolCallDelta {
        index: usize,
        id: Option<String>,
        name: Option<String>,
        /// Argument text to append
        arguments: String,
    },

    /// Token usage reported by the backend
    Usage(Usage),

    /// Backend finished this response
    Stop,
}

/// Everything a backend needs for one request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
}

/// Stream of backend increments
pub type BackendStream = Pin<Box<dyn Stream<Item = Result<BackendEvent>> + Send>>;

/// A streaming chat endpoint
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Start a streaming request. Connection and HTTP errors are returned
    /// here; errors while reading the body arrive as `Err` stream items.
    async fn stream_chat(&self, request: ChatRequest) -> Result<BackendStream>;

    /// Backend name (e.g., "openai", "gemini")
    fn provider_name(&self) -> &str;
}
