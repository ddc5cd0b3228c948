//! Auxiliary server connection
//!
//! Wraps an rmcp client service for one configured server, over either
//! streamable HTTP or a child process on stdio.

use anyhow::{anyhow, Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use rmcp::model::{CallToolRequestParams, CallToolResult, ListToolsResult, Tool};
use rmcp::service::RunningService;
use rmcp::transport::{
    streamable_http_client::StreamableHttpClientTransportConfig, StreamableHttpClientTransport,
    TokioChildProcess,
};
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::config::{AuxServerConfig, AuxTransport};
use crate::permissions::PermissionLevel;

/// The concrete transport type we use for HTTP connections
pub type HttpClientTransport = StreamableHttpClientTransport<reqwest::Client>;

/// A live connection to one auxiliary server
pub struct AuxServer {
    config: AuxServerConfig,

    /// The underlying rmcp service (None after disconnect)
    service: RwLock<Option<RunningService<RoleClient, ()>>>,
}

impl std::fmt::Debug for AuxServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuxServer")
            .field("name", &self.config.name)
            .finish()
    }
}

impl AuxServer {
    /// Connect and complete the MCP handshake
    pub async fn connect(config: AuxServerConfig) -> Result<Self> {
        tracing::info!("[AuxServer] Connecting to '{}'", config.name);

        let service = match &config.transport {
            AuxTransport::Http { url, headers } => {
                let client = reqwest::Client::builder()
                    .default_headers(header_map(headers)?)
                    .build()?;
                let transport = HttpClientTransport::with_client(
                    client,
                    StreamableHttpClientTransportConfig::with_uri(url.as_str()),
                );
                ().serve(transport)
                    .await
                    .with_context(|| format!("MCP handshake failed for {}", config.name))?
            }
            AuxTransport::Stdio { command, args, env } => {
                let mut cmd = tokio::process::Command::new(command);
                cmd.args(args);
                for (key, value) in env {
                    cmd.env(key, value);
                }
                let transport = TokioChildProcess::new(cmd)
                    .with_context(|| format!("Failed to start {}", config.name))?;
                ().serve(transport)
                    .await
                    .with_context(|| format!("MCP handshake failed for {}", config.name))?
            }
        };

        tracing::info!("[AuxServer] Connected to '{}'", config.name);

        Ok(Self {
            config,
            service: RwLock::new(Some(service)),
        })
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn permission(&self) -> PermissionLevel {
        self.config.permission
    }

    pub async fn is_connected(&self) -> bool {
        self.service.read().await.is_some()
    }

    /// List all tools available on this server
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let guard = self.service.read().await;
        let service = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Auxiliary server '{}' is not connected", self.config.name))?;

        let result: ListToolsResult = service.list_tools(Default::default()).await?;
        tracing::info!(
            "[AuxServer] Got {} tools from '{}'",
            result.tools.len(),
            self.config.name
        );

        Ok(result.tools)
    }

    /// Call a tool by its server-local name
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        let guard = self.service.read().await;
        let service = guard
            .as_ref()
            .ok_or_else(|| anyhow!("Auxiliary server '{}' is not connected", self.config.name))?;

        tracing::info!("[AuxServer] Calling '{}' on '{}'", name, self.config.name);

        let result = service
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_string().into(),
                arguments,
                task: None,
            })
            .await?;

        Ok(result)
    }

    /// Close the session; later calls fail with "not connected"
    pub async fn disconnect(&self) {
        if let Some(service) = self.service.write().await.take() {
            if let Err(e) = service.cancel().await {
                tracing::debug!("[AuxServer] Close of '{}' failed: {}", self.config.name, e);
            }
        }
    }
}

fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (key, value) in headers {
        map.insert(
            HeaderName::from_bytes(key.as_bytes())
                .with_context(|| format!("Invalid header name: {}", key))?,
            HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", key))?,
        );
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer t".to_string());
        let map = header_map(&headers).unwrap();
        assert_eq!(map.get("authorization").unwrap(), "Bearer t");

        headers.insert("bad header".to_string(), "x".to_string());
        assert!(header_map(&headers).is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_to_connect() {
        let config = AuxServerConfig::stdio("ghost", "/nonexistent/mcp-server-binary", vec![]);
        assert!(AuxServer::connect(config).await.is_err());
    }
}
