//! Provider abstraction
//!
//! One interchangeable language-model backend plus its agentic loop. Callers
//! only ever see this trait and the [`NormalizedEvent`] stream:
//!
//! ```ignore
//! let mut provider = create_provider(ProviderKind::OpenAi);
//! provider.initialize(config).await?;
//! provider.send("List the files in this repo", vec![]).await?;
//!
//! let mut events = provider.stream();
//! while let Some(event) = events.next().await {
//!     renderer.render(&event);
//! }
//! provider.disconnect().await;
//! ```

use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use std::str::FromStr;

use crate::agent::{ProviderConfig, StandardProvider};
use crate::core::{FrameworkError, FrameworkResult, NormalizedEvent};
use crate::llm::ImageInput;
use crate::managed::ManagedProvider;

/// Lazy, finite, non-restartable sequence of events for one `send`
pub type EventStream = Pin<Box<dyn Stream<Item = NormalizedEvent> + Send>>;

/// Supported backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Claude through the managed CLI client
    Claude,
    OpenAi,
    Gemini,
    /// Local OpenAI-compatible server (zero cost)
    Ollama,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude",
            ProviderKind::OpenAi => "openai",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Environment variable holding this backend's API key
    pub fn api_key_var(&self) -> Option<&'static str> {
        match self {
            ProviderKind::Claude => Some("ANTHROPIC_API_KEY"),
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }

    /// Whether initialize must fail without a key (the managed client can
    /// fall back to its own login)
    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderKind::OpenAi | ProviderKind::Gemini)
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude-sonnet-4-5",
            ProviderKind::OpenAi => "gpt-4o",
            ProviderKind::Gemini => "gemini-2.5-flash",
            ProviderKind::Ollama => "llama3.1",
        }
    }

    /// Local backends report zero cost
    pub fn is_local(&self) -> bool {
        matches!(self, ProviderKind::Ollama)
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = FrameworkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Ok(ProviderKind::Claude),
            "openai" | "gpt" => Ok(ProviderKind::OpenAi),
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "ollama" | "local" => Ok(ProviderKind::Ollama),
            other => Err(FrameworkError::UnknownProvider(other.to_string())),
        }
    }
}

/// One interchangeable backend and its agentic loop
#[async_trait]
pub trait Provider: Send + Sync {
    /// Validate configuration and prepare the backend. Configuration errors
    /// (missing credentials, bad working directory) fail here, before any
    /// loop starts.
    async fn initialize(&mut self, config: ProviderConfig) -> FrameworkResult<()>;

    /// Queue a user message for the next `stream()`
    async fn send(&self, text: &str, images: Vec<ImageInput>) -> FrameworkResult<()>;

    /// Events for the last `send`; ends after exactly one `result` or `error`
    fn stream(&self) -> EventStream;

    /// Ask the running loop to stop at its next checkpoint
    async fn interrupt(&self);

    /// Release every resource; safe to call more than once
    async fn disconnect(&self);

    fn supports_resumption(&self) -> bool {
        false
    }

    fn supports_screen_control(&self) -> bool {
        false
    }

    fn kind(&self) -> ProviderKind;
}

/// Create an uninitialized provider for a backend
pub fn create_provider(kind: ProviderKind) -> Box<dyn Provider> {
    match kind {
        ProviderKind::Claude => Box::new(ManagedProvider::new()),
        other => Box::new(StandardProvider::new(other)),
    }
}

/// Creates providers on demand (the supervisor builds one per sub-agent)
pub trait ProviderFactory: Send + Sync {
    fn create(&self, kind: ProviderKind) -> Box<dyn Provider>;
}

/// Factory backed by [`create_provider`]
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultProviderFactory;

impl ProviderFactory for DefaultProviderFactory {
    fn create(&self, kind: ProviderKind) -> Box<dyn Provider> {
        create_provider(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!("Anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Claude);
        assert_eq!("openai".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!(" local ".parse::<ProviderKind>().unwrap(), ProviderKind::Ollama);

        let err = "palm".parse::<ProviderKind>().unwrap_err();
        assert!(matches!(err, FrameworkError::UnknownProvider(name) if name == "palm"));
    }

    #[test]
    fn test_factory_kinds() {
        for kind in [
            ProviderKind::Claude,
            ProviderKind::OpenAi,
            ProviderKind::Gemini,
            ProviderKind::Ollama,
        ] {
            assert_eq!(create_provider(kind).kind(), kind);
        }
        assert!(create_provider(ProviderKind::Claude).supports_resumption());
        assert!(!create_provider(ProviderKind::Ollama).supports_resumption());
    }
}
