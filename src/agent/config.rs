//! Provider Configuration
//!
//! Everything `Provider::initialize` needs, built with the builder pattern:
//!
//! ```ignore
//! let config = ProviderConfig::new("gpt-4o", "/workspace", Arc::new(ConsoleConsent::new()))
//!     .with_credentials(Credentials::from_env(ProviderKind::OpenAi)?)
//!     .with_system_prompt("You are a careful assistant")
//!     .with_aux_server(AuxServerConfig::http("github", "http://localhost:9000/mcp"))
//!     .with_max_iterations(40);
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::core::{AgentId, FrameworkError, FrameworkResult};
use crate::llm::{Credentials, PriceTable};
use crate::mcp::{AuxServerConfig, AuxServerStatusMap};
use crate::permissions::{ClassifierTables, ConsentHandler};
use crate::tools::{builtin_tools, Sandbox, Tool, ToolRegistry};

use super::executor::{ToolExecutor, DEFAULT_CONSENT_TIMEOUT};

/// Default bound on model turns per stream
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// Configuration for one provider instance
#[derive(Clone)]
pub struct ProviderConfig {
    pub credentials: Credentials,

    /// Model name passed to the backend
    pub model: String,

    /// Sandbox root for file and shell tools
    pub working_dir: PathBuf,

    pub system_prompt: String,

    /// Decides YELLOW / RED / COMPUTER calls
    pub consent: Arc<dyn ConsentHandler>,

    /// Backend session to resume (managed backend only)
    pub resume_id: Option<String>,

    pub aux_servers: Vec<AuxServerConfig>,

    pub agent_id: AgentId,

    pub user_id: Option<String>,

    /// Safety valve for the generic agentic loop
    pub max_iterations: usize,

    pub consent_timeout: Duration,

    /// Extra tools registered next to the built-ins
    pub extra_tools: Vec<Arc<dyn Tool>>,

    pub tables: Arc<ClassifierTables>,

    pub prices: Arc<PriceTable>,

    /// Shared record of which auxiliary servers connected
    pub aux_status: AuxServerStatusMap,
}

impl ProviderConfig {
    /// Create a configuration for the top-level agent `main`
    pub fn new(
        model: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        consent: Arc<dyn ConsentHandler>,
    ) -> Self {
        Self {
            credentials: Credentials::none(),
            model: model.into(),
            working_dir: working_dir.into(),
            system_prompt: String::new(),
            consent,
            resume_id: None,
            aux_servers: Vec::new(),
            agent_id: AgentId::default(),
            user_id: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            consent_timeout: DEFAULT_CONSENT_TIMEOUT,
            extra_tools: Vec::new(),
            tables: ClassifierTables::standard(),
            prices: PriceTable::standard(),
            aux_status: AuxServerStatusMap::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Resume a previous backend session
    pub fn with_resume_id(mut self, id: impl Into<String>) -> Self {
        self.resume_id = Some(id.into());
        self
    }

    pub fn with_aux_server(mut self, server: AuxServerConfig) -> Self {
        self.aux_servers.push(server);
        self
    }

    pub fn with_aux_servers(mut self, servers: Vec<AuxServerConfig>) -> Self {
        self.aux_servers = servers;
        self
    }

    pub fn with_agent_id(mut self, id: AgentId) -> Self {
        self.agent_id = id;
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = timeout;
        self
    }

    /// Register an extra tool (e.g. a delegation meta-tool)
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.extra_tools.push(tool);
        self
    }

    pub fn with_tables(mut self, tables: Arc<ClassifierTables>) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_prices(mut self, prices: Arc<PriceTable>) -> Self {
        self.prices = prices;
        self
    }

    pub fn with_aux_status(mut self, status: AuxServerStatusMap) -> Self {
        self.aux_status = status;
        self
    }

    /// Configuration for a sub-agent: same policy, credentials and workspace,
    /// its own id and prompt, never resumed
    pub fn for_child(&self, child_id: AgentId, system_prompt: String) -> Self {
        let mut child = self.clone();
        child.agent_id = child_id;
        child.system_prompt = system_prompt;
        child.resume_id = None;
        child.aux_status = AuxServerStatusMap::new();
        child
    }

    /// Build the permission-gated executor for this agent
    pub fn build_executor(&self) -> FrameworkResult<ToolExecutor> {
        if !self.working_dir.is_dir() {
            return Err(FrameworkError::InvalidConfig(format!(
                "working directory {} does not exist",
                self.working_dir.display()
            )));
        }
        let sandbox = Sandbox::new(&self.working_dir).map_err(|e| {
            FrameworkError::InvalidConfig(format!(
                "working directory {}: {:#}",
                self.working_dir.display(),
                e
            ))
        })?;

        let mut registry = ToolRegistry::new();
        for tool in builtin_tools(&sandbox) {
            registry.register(tool);
        }
        for tool in &self.extra_tools {
            registry.register(tool.clone());
        }

        let mut executor = ToolExecutor::new(sandbox, self.consent.clone(), self.agent_id.clone())
            .with_tables(self.tables.clone())
            .with_registry(registry)
            .with_consent_timeout(self.consent_timeout);
        if let Some(user_id) = &self.user_id {
            executor = executor.with_user_id(user_id.clone());
        }

        Ok(executor)
    }
}
