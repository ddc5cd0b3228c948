//! Managed client process
//!
//! The managed backend runs its own agentic loop inside an external CLI. A
//! [`ManagedConnector`] starts one client and hands back its line streams; a
//! [`ManagedSession`] owns the process so it dies with the session.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, Command};

use crate::mcp::{managed_config, AuxServerConfig};

use super::protocol::{self, CliMessage};

/// How long the client gets to answer a control request during setup
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything needed to start one client process
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub model: String,
    pub system_prompt: String,
    pub working_dir: PathBuf,
    pub resume_id: Option<String>,
    pub aux_servers: Vec<AuxServerConfig>,
    pub api_key: Option<String>,
}

type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Incoming half of a session
pub struct SessionReader {
    lines: Lines<BufReader<BoxReader>>,
}

impl SessionReader {
    /// Next raw line, `None` once the client closed its output
    pub async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.next_line().await?)
    }
}

/// Outgoing half of a session; owns the process
pub struct SessionWriter {
    writer: BoxWriter,
    child: Option<Child>,
}

impl SessionWriter {
    /// Write one JSON line
    pub async fn write_json(&mut self, value: &Value) -> Result<()> {
        let mut line = serde_json::to_string(value)?;
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Close stdin and reap the process
    pub async fn close(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            tracing::debug!("[Managed] stdin shutdown failed: {}", e);
        }
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                tracing::debug!("[Managed] kill failed: {}", e);
            }
            if let Err(e) = child.wait().await {
                tracing::debug!("[Managed] wait failed: {}", e);
            }
        }
    }
}

/// Line streams of one running client
pub struct ManagedSession {
    reader: SessionReader,
    writer: SessionWriter,
}

impl ManagedSession {
    /// Session over arbitrary streams (no process to reap)
    pub fn from_io(reader: BoxReader, writer: BoxWriter) -> Self {
        Self {
            reader: SessionReader {
                lines: BufReader::new(reader).lines(),
            },
            writer: SessionWriter {
                writer,
                child: None,
            },
        }
    }

    fn with_child(mut self, child: Child) -> Self {
        self.writer.child = Some(child);
        self
    }

    /// Separate halves, so writes (interrupts, permission answers) never
    /// wait behind a pending read
    pub fn split(self) -> (SessionReader, SessionWriter) {
        (self.reader, self.writer)
    }

    pub async fn write_json(&mut self, value: &Value) -> Result<()> {
        self.writer.write_json(value).await
    }

    pub async fn next_line(&mut self) -> Result<Option<String>> {
        self.reader.next_line().await
    }

    pub async fn close(&mut self) {
        self.writer.close().await
    }

    /// Send a control request and wait for its response
    ///
    /// Lines that arrive in between are not part of a turn yet and are
    /// dropped.
    pub async fn control(&mut self, request: Value) -> Result<Value> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().simple());
        self.write_json(&protocol::control_request(&request_id, request))
            .await?;

        loop {
            let line = self
                .next_line()
                .await?
                .ok_or_else(|| anyhow!("managed client exited during handshake"))?;

            match protocol::parse_line(&line) {
                Some(CliMessage::ControlResponse { response }) if response.request_id == request_id => {
                    if response.subtype == "error" {
                        bail!(
                            "control request failed: {}",
                            response.error.unwrap_or_else(|| "unknown error".to_string())
                        );
                    }
                    return Ok(response.response.unwrap_or(Value::Null));
                }
                Some(other) => tracing::debug!("[Managed] Ignoring during handshake: {:?}", other),
                None => {}
            }
        }
    }

    /// Initialize the protocol and verify every requested server connected
    pub async fn handshake(&mut self, servers: &[AuxServerConfig]) -> Result<()> {
        tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
            self.control(json!({ "subtype": "initialize" })).await?;

            if servers.is_empty() {
                return Ok(());
            }

            let status = self.control(json!({ "subtype": "mcp_status" })).await?;
            let reported = status
                .get("mcpServers")
                .and_then(|v| v.as_array())
                .cloned()
                .unwrap_or_default();

            for server in servers {
                let state = reported
                    .iter()
                    .find(|entry| entry.get("name").and_then(|n| n.as_str()) == Some(server.name.as_str()))
                    .and_then(|entry| entry.get("status").and_then(|s| s.as_str()))
                    .unwrap_or("missing");
                if state != "connected" {
                    bail!("auxiliary server '{}' is {}", server.name, state);
                }
            }
            Ok::<_, anyhow::Error>(())
        })
        .await
        .context("managed client handshake timed out")?
    }
}

/// Starts managed client processes
#[async_trait]
pub trait ManagedConnector: Send + Sync {
    /// Start a client configured with exactly `options.aux_servers`
    async fn connect(&self, options: &LaunchOptions) -> Result<ManagedSession>;
}

/// Connector for the Claude Code CLI in stream-json mode
#[derive(Debug, Clone)]
pub struct ClaudeCliConnector {
    cli_path: String,
}

impl ClaudeCliConnector {
    /// `cli_path` defaults to `claude` on PATH
    pub fn new(cli_path: Option<String>) -> Self {
        Self {
            cli_path: cli_path
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "claude".to_string()),
        }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("SHADOW_CLAUDE_CLI").ok())
    }

    fn build_args(options: &LaunchOptions) -> Vec<String> {
        let mut args: Vec<String> = [
            "--output-format",
            "stream-json",
            "--input-format",
            "stream-json",
            "--verbose",
            "--permission-prompt-tool",
            "stdio",
            "--model",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        args.push(options.model.clone());

        if !options.system_prompt.is_empty() {
            args.push("--append-system-prompt".into());
            args.push(options.system_prompt.clone());
        }
        if let Some(resume) = &options.resume_id {
            args.push("--resume".into());
            args.push(resume.clone());
        }
        if !options.aux_servers.is_empty() {
            args.push("--mcp-config".into());
            args.push(managed_config(&options.aux_servers).to_string());
        }
        args
    }
}

impl Default for ClaudeCliConnector {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl ManagedConnector for ClaudeCliConnector {
    async fn connect(&self, options: &LaunchOptions) -> Result<ManagedSession> {
        let mut cmd = Command::new(&self.cli_path);
        cmd.args(Self::build_args(options))
            .current_dir(&options.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        if let Some(key) = &options.api_key {
            cmd.env("ANTHROPIC_API_KEY", key);
        }

        tracing::debug!(
            "[Managed] Spawning {} with {} auxiliary servers",
            self.cli_path,
            options.aux_servers.len()
        );

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {}", self.cli_path))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("No stdin from managed client"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow!("No stdout from managed client"))?;

        Ok(ManagedSession::from_io(Box::new(stdout), Box::new(stdin)).with_child(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> LaunchOptions {
        LaunchOptions {
            model: "claude-sonnet-4-5".into(),
            system_prompt: "be brief".into(),
            working_dir: PathBuf::from("."),
            resume_id: Some("sess-9".into()),
            aux_servers: vec![AuxServerConfig::http("gh", "http://localhost:1/mcp")],
            api_key: None,
        }
    }

    #[test]
    fn test_cli_arguments() {
        let args = ClaudeCliConnector::build_args(&options());
        let joined = args.join(" ");
        assert!(joined.contains("--permission-prompt-tool stdio"));
        assert!(joined.contains("--resume sess-9"));
        assert!(joined.contains("--append-system-prompt be brief"));
        let config_pos = args.iter().position(|a| a == "--mcp-config").unwrap();
        let config: Value = serde_json::from_str(&args[config_pos + 1]).unwrap();
        assert_eq!(config["mcpServers"]["gh"]["type"], "http");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_reaps_child() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap();
        let stdin = child.stdin.take().unwrap();
        let stdout = child.stdout.take().unwrap();
        let mut session =
            ManagedSession::from_io(Box::new(stdout), Box::new(stdin)).with_child(child);

        tokio::time::timeout(Duration::from_secs(5), session.close())
            .await
            .unwrap();
        assert!(session.writer.child.is_none());
        assert!(session.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_connect() {
        let connector = ClaudeCliConnector::new(Some("/nonexistent/claude-cli".into()));
        assert!(connector.connect(&options()).await.is_err());
    }

    #[tokio::test]
    async fn test_handshake_rejects_failed_server() {
        let (ours, theirs) = tokio::io::duplex(8192);
        let (read, write) = tokio::io::split(ours);
        let mut session = ManagedSession::from_io(Box::new(read), Box::new(write));

        tokio::spawn(async move {
            let (read, mut write) = tokio::io::split(theirs);
            let mut lines = BufReader::new(read).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let msg: Value = serde_json::from_str(&line).unwrap();
                let id = msg["request_id"].as_str().unwrap().to_string();
                let body = match msg["request"]["subtype"].as_str() {
                    Some("mcp_status") => json!({ "mcpServers": [{ "name": "gh", "status": "failed" }] }),
                    _ => json!({}),
                };
                let reply = json!({ "type": "control_response",
                    "response": { "subtype": "success", "request_id": id, "response": body } });
                write.write_all(format!("{}\n", reply).as_bytes()).await.unwrap();
            }
        });

        let err = session.handshake(&options().aux_servers).await.unwrap_err();
        assert!(err.to_string().contains("'gh' is failed"));
    }
}
