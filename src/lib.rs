//! Agent execution engine
//!
//! Interchangeable language-model backends behind one [`provider::Provider`]
//! trait, a permission-gated tool executor and a supervisor for
//! hierarchical sub-agents.
//!
//! ```ignore
//! use shadow_agent_engine::prelude::*;
//!
//! let config = ProviderConfig::new("gpt-4o", "/workspace", Arc::new(ConsoleConsent::new()))
//!     .with_credentials(Credentials::from_env(ProviderKind::OpenAi)?);
//!
//! let mut provider = create_provider(ProviderKind::OpenAi);
//! provider.initialize(config).await?;
//! provider.send("What does this repo do?", vec![]).await?;
//! ConsoleRenderer::new().run(provider.stream()).await;
//! provider.disconnect().await;
//! ```

pub mod core;
pub mod permissions;
pub mod tools;

// Backends and their loops
pub mod agent;
pub mod llm;
pub mod managed;
pub mod provider;

// Auxiliary tool servers (MCP)
pub mod mcp;

// Sub-agents
pub mod runtime;

// Optional components
pub mod cli;
pub mod config;
pub mod logging;

/// Common imports for embedding the engine
pub mod prelude {
    pub use std::sync::Arc;

    pub use crate::agent::ProviderConfig;
    pub use crate::cli::{ConsoleConsent, ConsoleRenderer};
    pub use crate::core::{AgentId, FrameworkError, FrameworkResult, NormalizedEvent, ResultPayload};
    pub use crate::llm::{Credentials, ImageInput};
    pub use crate::mcp::AuxServerConfig;
    pub use crate::permissions::{ConsentDecision, ConsentHandler, PermissionLevel};
    pub use crate::provider::{create_provider, Provider, ProviderKind};
    pub use crate::runtime::{AgentRegistry, SpawnOutcome, SubAgentSupervisor};
}
