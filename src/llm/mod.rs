//! Language-model backends for the generic agentic loop
//!
//! - `types` - Provider-neutral conversation types
//! - `backend` - `ChatBackend` trait implemented by each HTTP client
//! - `openai` - OpenAI-compatible chat completions (also Ollama)
//! - `gemini` - Google Gemini
//! - `pricing` - Per-model price table
//! - `credentials` - API keys and base URLs

pub mod backend;
pub mod credentials;
pub mod gemini;
pub mod openai;
pub mod pricing;
mod sse;
pub mod types;

pub use backend::{BackendEvent, BackendStream, ChatBackend, ChatRequest};
pub use credentials::Credentials;
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;
pub use pricing::{ModelPrice, PriceTable};
pub use types::{ContentBlock, ImageInput, Message, Role, ToolDefinition, Usage};
