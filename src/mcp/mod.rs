//! Auxiliary tool servers (MCP)
//!
//! External servers that expose extra tools to an agent.
//!
//! - `AuxServerConfig`: name, transport (HTTP or stdio) and inherited permission level
//! - `AuxServerStatusMap`: shared name -> Connected | Failed(reason) map
//! - `connect_with_degradation`: all-or-nothing connect search used by the managed backend
//! - `AuxServer` / `AuxToolAdapter` / `AuxToolProvider`: in-process rmcp clients
//!   for the generic-loop backends
//!
//! # Tool Namespacing
//!
//! In-process tools are exposed as `<server>__<tool>`; the managed client names
//! them `mcp__<server>__<tool>`. Either way the tool inherits the permission
//! level configured for its server.

mod config;
mod degrade;
mod provider;
mod server;
mod status;
mod tool_adapter;

pub use config::{load_aux_servers, managed_config, AuxServerConfig, AuxTransport};
pub use degrade::{connect_with_degradation, Degraded};
pub use provider::AuxToolProvider;
pub use server::AuxServer;
pub use status::{AuxServerStatus, AuxServerStatusMap};
pub use tool_adapter::AuxToolAdapter;
