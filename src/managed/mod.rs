//! Managed backend
//!
//! Claude runs through an external CLI client that owns the agentic loop.
//! The engine starts the client, speaks its stream-json protocol and answers
//! its permission questions.

mod client;
pub mod protocol;
mod provider;

pub use client::{
    ClaudeCliConnector, LaunchOptions, ManagedConnector, ManagedSession, SessionReader,
    SessionWriter, HANDSHAKE_TIMEOUT,
};
pub use provider::ManagedProvider;
