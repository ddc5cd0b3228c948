//! Framework error types

use thiserror::Error;

/// Errors that can occur in the agent engine
#[derive(Error, Debug)]
pub enum FrameworkError {
    /// Credentials required by a backend are missing
    #[error("Missing credentials for {backend}: set {variable}")]
    MissingCredentials {
        /// Backend that needs the credential
        backend: String,
        /// Environment variable (or config field) that should hold it
        variable: String,
    },

    /// Backend name not recognised
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Provider used before `initialize`
    #[error("Provider not initialized")]
    NotInitialized,

    /// Provider initialized twice
    #[error("Provider already initialized")]
    AlreadyInitialized,

    /// An agent with this id is already registered
    #[error("Agent already registered: {0}")]
    AgentAlreadyRegistered(String),

    /// Agent id is malformed
    #[error("Invalid agent id: {0}")]
    InvalidAgentId(String),

    /// Backend or managed client failure
    #[error("Backend error: {0}")]
    Backend(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl FrameworkError {
    /// Create a missing credentials error
    pub fn missing_credentials(backend: impl Into<String>, variable: impl Into<String>) -> Self {
        FrameworkError::MissingCredentials {
            backend: backend.into(),
            variable: variable.into(),
        }
    }

    /// Create a backend error from anything displayable
    pub fn backend(err: impl std::fmt::Display) -> Self {
        FrameworkError::Backend(err.to_string())
    }
}

/// Result type alias for framework operations
pub type FrameworkResult<T> = Result<T, FrameworkError>;

/// Which sub-agent budget a spawn would exceed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BudgetError {
    #[error("depth budget exceeded: depth {depth} > max {max}")]
    Depth { depth: usize, max: usize },

    #[error("per-parent budget exceeded: {parent} already has {max} active sub-agents")]
    PerParent { parent: String, max: usize },

    #[error("global budget exceeded: {max} agents already registered")]
    Global { max: usize },
}

/// Errors returned by the sub-agent supervisor at spawn time
#[derive(Error, Debug)]
pub enum SpawnError {
    /// Short name does not match the identifier pattern
    #[error("Invalid sub-agent name '{0}': must start with a letter and contain only letters, digits, '_' or '-' (max 64)")]
    InvalidName(String),

    /// A hierarchy/resource budget would be exceeded
    #[error("Sub-agent budget exceeded: {0}")]
    Budget(#[from] BudgetError),

    /// An active child with this name already exists under the parent
    #[error("Sub-agent '{name}' is already active under {parent}")]
    DuplicateName { parent: String, name: String },

    /// The child provider could not be created or initialized
    #[error("Failed to start sub-agent: {0}")]
    Provider(#[from] FrameworkError),
}

impl SpawnError {
    /// True for depth / per-parent / global budget failures
    pub fn is_budget(&self) -> bool {
        matches!(self, SpawnError::Budget(_))
    }
}
