//! Backend credentials
//!
//! ```ignore
//! use shadow_agent_engine::llm::Credentials;
//! use shadow_agent_engine::provider::ProviderKind;
//!
//! // From environment variables
//! let creds = Credentials::from_env(ProviderKind::OpenAi)?;
//!
//! // Explicit key routed through a proxy
//! let creds = Credentials::with_base_url("sk-...", "https://proxy.example.com/v1");
//! ```

use std::env;

use crate::core::{FrameworkError, FrameworkResult};
use crate::provider::ProviderKind;

/// Default base URL of a local Ollama server (OpenAI-compatible endpoint)
pub const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434/v1";

/// Authentication configuration for a backend
#[derive(Clone, Default)]
pub struct Credentials {
    /// API key or token (local backends need none)
    pub api_key: Option<String>,
    /// Optional custom base URL (overrides the default API endpoint)
    pub base_url: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Credentials {
    /// Create credentials with just an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: None,
        }
    }

    /// Create credentials with API key and custom base URL
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: Some(base_url.into()),
        }
    }

    /// Credentials for a backend that needs no key
    pub fn none() -> Self {
        Self::default()
    }

    /// Read credentials for a backend from the environment
    ///
    /// - Claude: `ANTHROPIC_API_KEY` (optional, the CLI may hold its own login)
    /// - OpenAI: `OPENAI_API_KEY` (required), `OPENAI_BASE_URL`
    /// - Gemini: `GEMINI_API_KEY` (required), `GEMINI_BASE_URL`
    /// - Ollama: `OLLAMA_BASE_URL` (defaults to the local server)
    pub fn from_env(kind: ProviderKind) -> FrameworkResult<Self> {
        let var = |name: &str| env::var(name).ok().filter(|v| !v.trim().is_empty());

        let creds = match kind {
            ProviderKind::Claude => Self {
                api_key: var("ANTHROPIC_API_KEY"),
                base_url: var("ANTHROPIC_BASE_URL"),
            },
            ProviderKind::OpenAi => Self {
                api_key: var("OPENAI_API_KEY"),
                base_url: var("OPENAI_BASE_URL"),
            },
            ProviderKind::Gemini => Self {
                api_key: var("GEMINI_API_KEY"),
                base_url: var("GEMINI_BASE_URL"),
            },
            ProviderKind::Ollama => Self {
                api_key: None,
                base_url: Some(
                    var("OLLAMA_BASE_URL").unwrap_or_else(|| OLLAMA_DEFAULT_BASE_URL.to_string()),
                ),
            },
        };

        creds.validate(kind)?;
        Ok(creds)
    }

    /// Fail fast if the backend needs a key and none is set
    pub fn validate(&self, kind: ProviderKind) -> FrameworkResult<()> {
        if let Some(variable) = kind.api_key_var() {
            if kind.requires_api_key() && self.api_key.is_none() {
                return Err(FrameworkError::missing_credentials(kind.as_str(), variable));
            }
        }
        Ok(())
    }

    /// API key, or an error naming the variable that should hold it
    pub(crate) fn require_key(&self, kind: ProviderKind) -> FrameworkResult<&str> {
        self.api_key.as_deref().ok_or_else(|| {
            FrameworkError::missing_credentials(
                kind.as_str(),
                kind.api_key_var().unwrap_or("api_key"),
            )
        })
    }
}
