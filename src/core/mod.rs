//! Core types for the agent engine
//!
//! This module provides the fundamental types used throughout the engine:
//! - `NormalizedEvent` - The uniform event every provider streams
//! - `AgentId` - Hierarchical agent identifiers
//! - `LoopState` - States of the generic agentic loop
//! - `FrameworkError` / `SpawnError` - Error types

pub mod agent_id;
pub mod error;
pub mod event;
pub mod state;

pub use agent_id::{AgentId, SEPARATOR};
pub use error::{BudgetError, FrameworkError, FrameworkResult, SpawnError};
pub use event::{NormalizedEvent, ResultPayload};
pub use state::LoopState;
