//! Agent execution
//!
//! - `ToolExecutor`: permission-gated dispatch of tool calls
//! - `ProviderConfig`: everything a provider needs to initialize
//! - `StandardProvider`: the generic agentic loop over a `ChatBackend`

pub mod config;
pub mod executor;
pub mod standard_loop;

pub use config::{ProviderConfig, DEFAULT_MAX_ITERATIONS};
pub use executor::{ToolExecutor, DEFAULT_CONSENT_TIMEOUT};
pub use standard_loop::{StandardProvider, ToolCall, ToolCallAccumulator};
