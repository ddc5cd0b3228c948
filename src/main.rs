use std::sync::Arc;

use anyhow::{bail, Result};
use shadow_agent_engine::cli::{ConsoleConsent, ConsoleRenderer};
use shadow_agent_engine::config::EngineConfig;
use shadow_agent_engine::core::AgentId;
use shadow_agent_engine::llm::Credentials;
use shadow_agent_engine::logging;
use shadow_agent_engine::provider::{create_provider, Provider};
use shadow_agent_engine::runtime::AgentRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        eprintln!("usage: shadow-agent-engine <prompt>");
        std::process::exit(2);
    }

    let config = EngineConfig::from_env()?;
    let _log_guard = logging::init_logging(&config.logging)?;

    tracing::info!(
        "=== Agent engine starting ({} / {}) ===",
        config.provider,
        config.model
    );

    let credentials = Credentials::from_env(config.provider)?;
    let provider_config = config.provider_config(credentials, Arc::new(ConsoleConsent::new()));

    let mut provider = create_provider(config.provider);
    provider.initialize(provider_config.clone()).await?;
    for name in provider_config.aux_status.failed() {
        tracing::warn!("Auxiliary server '{}' is unavailable for this session", name);
    }

    let provider: Arc<dyn Provider> = Arc::from(provider);
    let registry = AgentRegistry::new();
    let main_id = AgentId::default();
    registry.register(main_id.clone(), provider.clone(), &config.working_dir)?;

    // Ctrl-C stops the turn at its next checkpoint
    let interrupter = provider.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupter.interrupt().await;
        }
    });

    provider.send(&prompt, Vec::new()).await?;
    let result = ConsoleRenderer::new().run(provider.stream()).await;

    ctrl_c.abort();
    provider.disconnect().await;
    registry.remove(&main_id);

    tracing::info!("=== Agent engine shutting down ===");

    match result {
        Some(result) if !result.is_error => Ok(()),
        Some(_) => bail!("the turn ended in an error state"),
        None => bail!("the turn failed before producing a result"),
    }
}
