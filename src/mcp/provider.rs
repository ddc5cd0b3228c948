//! Auxiliary Tool Provider
//!
//! Implements `ToolProvider` over a set of in-process server connections.
//! Servers are connected one at a time; a server that fails is recorded in
//! the status map and simply contributes no tools.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::tools::{Tool, ToolProvider};

use super::config::AuxServerConfig;
use super::server::AuxServer;
use super::status::AuxServerStatusMap;
use super::tool_adapter::AuxToolAdapter;

/// Tool provider that fetches tools from connected auxiliary servers
pub struct AuxToolProvider {
    servers: Vec<Arc<AuxServer>>,
    statuses: AuxServerStatusMap,
}

impl AuxToolProvider {
    /// Provider over already-connected servers
    pub fn new(servers: Vec<Arc<AuxServer>>, statuses: AuxServerStatusMap) -> Self {
        Self { servers, statuses }
    }

    /// Connect every configured server, recording each outcome
    pub async fn connect_all(configs: &[AuxServerConfig], statuses: AuxServerStatusMap) -> Self {
        let mut servers = Vec::new();
        for config in configs {
            match AuxServer::connect(config.clone()).await {
                Ok(server) => {
                    statuses.mark_connected(&config.name);
                    servers.push(Arc::new(server));
                }
                Err(e) => statuses.mark_failed(&config.name, format!("{:#}", e)),
            }
        }
        Self::new(servers, statuses)
    }

    pub fn servers(&self) -> &[Arc<AuxServer>] {
        &self.servers
    }

    /// Close every connection
    pub async fn disconnect(&self) {
        for server in &self.servers {
            server.disconnect().await;
        }
    }
}

#[async_trait]
impl ToolProvider for AuxToolProvider {
    async fn get_tools(&self) -> Result<Vec<Arc<dyn Tool>>> {
        let mut tools: Vec<Arc<dyn Tool>> = Vec::new();

        for server in &self.servers {
            match server.list_tools().await {
                Ok(listed) => {
                    for rmcp_tool in listed {
                        tools.push(Arc::new(AuxToolAdapter::new(server.clone(), rmcp_tool)));
                    }
                }
                Err(e) => {
                    self.statuses
                        .mark_failed(server.name(), format!("listing tools failed: {:#}", e));
                }
            }
        }

        tracing::info!("[AuxTools] Created {} tool adapters", tools.len());
        Ok(tools)
    }

    fn name(&self) -> &str {
        "aux-servers"
    }
}
