//! Auxiliary tool server configuration
//!
//! Each entry names one external MCP server, how to reach it, and the
//! permission level its tools inherit.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::Path;

use crate::core::{FrameworkError, FrameworkResult};
use crate::permissions::PermissionLevel;

/// How to reach an auxiliary server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuxTransport {
    /// Streamable HTTP endpoint
    Http {
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },

    /// Child process speaking MCP over stdio
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
}

/// Configuration for a single auxiliary server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxServerConfig {
    /// Unique name (used for namespacing tools)
    pub name: String,

    #[serde(flatten)]
    pub transport: AuxTransport,

    /// Level every tool from this server is classified at
    #[serde(default = "default_permission")]
    pub permission: PermissionLevel,
}

fn default_permission() -> PermissionLevel {
    PermissionLevel::Yellow
}

impl AuxServerConfig {
    /// HTTP server with no extra headers
    pub fn http(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transport: AuxTransport::Http {
                url: url.into(),
                headers: HashMap::new(),
            },
            permission: default_permission(),
        }
    }

    /// Stdio server
    pub fn stdio(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            transport: AuxTransport::Stdio {
                command: command.into(),
                args,
                env: HashMap::new(),
            },
            permission: default_permission(),
        }
    }

    /// Add a header (HTTP) or environment variable (stdio)
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match &mut self.transport {
            AuxTransport::Http { headers, .. } => {
                headers.insert(key.into(), value.into());
            }
            AuxTransport::Stdio { env, .. } => {
                env.insert(key.into(), value.into());
            }
        }
        self
    }

    /// Set the inherited permission level
    pub fn with_permission(mut self, level: PermissionLevel) -> Self {
        self.permission = level;
        self
    }

    /// Tool-name prefix the managed client uses for this server
    pub fn managed_prefix(&self) -> String {
        format!("mcp__{}__", self.name)
    }

    /// Entry in the managed client's `mcpServers` JSON
    pub fn to_managed_entry(&self) -> Value {
        match &self.transport {
            AuxTransport::Http { url, headers } => json!({
                "type": "http",
                "url": url,
                "headers": headers,
            }),
            AuxTransport::Stdio { command, args, env } => json!({
                "type": "stdio",
                "command": command,
                "args": args,
                "env": env,
            }),
        }
    }
}

/// `{"mcpServers": {...}}` document for a set of servers
pub fn managed_config(servers: &[AuxServerConfig]) -> Value {
    let entries: Map<String, Value> = servers
        .iter()
        .map(|s| (s.name.clone(), s.to_managed_entry()))
        .collect();
    json!({ "mcpServers": entries })
}

#[derive(Debug, Deserialize)]
struct AuxServersFile {
    #[serde(default)]
    aux_servers: Vec<AuxServerConfig>,
}

/// Load `{"aux_servers": [...]}` from a JSON file
pub fn load_aux_servers(path: &Path) -> FrameworkResult<Vec<AuxServerConfig>> {
    let raw = std::fs::read_to_string(path)?;
    let file: AuxServersFile = serde_json::from_str(&raw)?;

    let mut seen = std::collections::HashSet::new();
    for server in &file.aux_servers {
        if !seen.insert(server.name.as_str()) {
            return Err(FrameworkError::InvalidConfig(format!(
                "duplicate auxiliary server name: {}",
                server.name
            )));
        }
    }

    Ok(file.aux_servers)
}
