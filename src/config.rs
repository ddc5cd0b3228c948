//! Binary configuration from the environment
//!
//! | Variable | Meaning | Default |
//! |---|---|---|
//! | `SHADOW_PROVIDER` | `claude`, `openai`, `gemini`, `ollama` | `claude` |
//! | `SHADOW_MODEL` | model name | the backend's default |
//! | `SHADOW_WORKDIR` | sandbox root | current directory |
//! | `SHADOW_USER_ID` | user id injected into tool calls | none |
//! | `SHADOW_MCP_CONFIG` | JSON file with an `aux_servers` array | none |
//! | `SHADOW_MAX_ITERATIONS` | generic loop bound | 25 |
//! | `SHADOW_LOG_DIR` | directory for rolling log files | none |
//! | `SHADOW_LOG_JSON` | `1`/`true` for JSON log files | off |

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::agent::{ProviderConfig, DEFAULT_MAX_ITERATIONS};
use crate::core::{FrameworkError, FrameworkResult};
use crate::llm::Credentials;
use crate::logging::LoggingConfig;
use crate::mcp::{load_aux_servers, AuxServerConfig};
use crate::permissions::ConsentHandler;
use crate::provider::ProviderKind;

/// Settings for one run of the binary
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub working_dir: PathBuf,
    pub user_id: Option<String>,
    pub aux_servers: Vec<AuxServerConfig>,
    pub max_iterations: usize,
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Read every `SHADOW_*` variable
    pub fn from_env() -> FrameworkResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as `from_env`, over any variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> FrameworkResult<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let provider: ProviderKind = match var("SHADOW_PROVIDER") {
            Some(name) => name.parse()?,
            None => ProviderKind::Claude,
        };

        let model = var("SHADOW_MODEL").unwrap_or_else(|| provider.default_model().to_string());

        let working_dir = match var("SHADOW_WORKDIR") {
            Some(dir) => PathBuf::from(dir),
            None => env::current_dir()?,
        };

        let aux_servers = match var("SHADOW_MCP_CONFIG") {
            Some(path) => load_aux_servers(&PathBuf::from(path))?,
            None => Vec::new(),
        };

        let max_iterations = match var("SHADOW_MAX_ITERATIONS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                FrameworkError::InvalidConfig(format!("SHADOW_MAX_ITERATIONS is not a number: {}", raw))
            })?,
            None => DEFAULT_MAX_ITERATIONS,
        };

        let mut logging = LoggingConfig::default()
            .with_json(var("SHADOW_LOG_JSON").map(|v| is_truthy(&v)).unwrap_or(false));
        if let Some(dir) = var("SHADOW_LOG_DIR") {
            logging = logging.with_log_dir(dir);
        }

        Ok(Self {
            provider,
            model,
            working_dir,
            user_id: var("SHADOW_USER_ID"),
            aux_servers,
            max_iterations,
            logging,
        })
    }

    /// Provider configuration for the top-level agent
    pub fn provider_config(
        &self,
        credentials: Credentials,
        consent: Arc<dyn ConsentHandler>,
    ) -> ProviderConfig {
        let mut config = ProviderConfig::new(&self.model, &self.working_dir, consent)
            .with_credentials(credentials)
            .with_aux_servers(self.aux_servers.clone())
            .with_max_iterations(self.max_iterations);
        if let Some(user_id) = &self.user_id {
            config = config.with_user_id(user_id.clone());
        }
        config
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
