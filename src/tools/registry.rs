//! Tool registry for managing available tools
//!
//! The registry maps tool names to handlers. It holds both static tools
//! (registered directly) and dynamic tools from providers (like auxiliary
//! MCP servers), and can be reloaded when a provider's tool set changes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;

use super::provider::ToolProvider;
use super::tool::Tool;
use crate::llm::ToolDefinition;
use crate::permissions::PermissionLevel;

/// Shared flag asking the owner of a registry to reload it
///
/// Anything holding a clone (a plugin installer, a file watcher) can request
/// a reload; the executor observes it before its next dispatch.
#[derive(Debug, Clone, Default)]
pub struct ReloadFlag(Arc<AtomicBool>);

impl ReloadFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a reload at the next opportunity
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Consume a pending request
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Registry that holds all available tools
pub struct ToolRegistry {
    /// All tools by name
    tools: HashMap<String, Arc<dyn Tool>>,

    /// Dynamic tool providers
    providers: Vec<Arc<dyn ToolProvider>>,

    /// Names contributed by each provider (so reload can drop them)
    provider_tools: HashMap<String, Vec<String>>,

    reload_flag: ReloadFlag,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            providers: Vec::new(),
            provider_tools: HashMap::new(),
            reload_flag: ReloadFlag::new(),
        }
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let name = tool.name().to_string();
        tracing::info!("[ToolRegistry] Registering tool: {}", name);
        let previous = self.tools.insert(name.clone(), tool);
        if previous.is_some() {
            tracing::info!("[ToolRegistry] Replaced existing tool: {}", name);
        }
        previous
    }

    /// Remove a tool by name
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        let removed = self.tools.remove(name);
        if removed.is_some() {
            tracing::info!("[ToolRegistry] Removed tool: {}", name);
            for names in self.provider_tools.values_mut() {
                names.retain(|n| n != name);
            }
        }
        removed
    }

    /// Add a tool provider
    ///
    /// Immediately fetches all tools from the provider. Fails without
    /// changing the registry if any tool name collides with an existing tool.
    pub async fn add_provider(&mut self, provider: Arc<dyn ToolProvider>) -> Result<usize> {
        tracing::info!("[ToolRegistry] Adding provider '{}'", provider.name());

        let tools = provider.get_tools().await?;

        if let Some(conflict) = tools.iter().find(|t| self.tools.contains_key(t.name())) {
            anyhow::bail!(
                "Tool name conflict: '{}' already exists (from provider '{}')",
                conflict.name(),
                provider.name()
            );
        }

        let count = tools.len();
        self.insert_provider_tools(provider.name(), tools);
        self.providers.push(provider);

        Ok(count)
    }

    /// Re-fetch tools from every provider
    ///
    /// Provider tools are dropped and re-added; static tools are untouched.
    /// A provider that fails to refresh contributes no tools until the next
    /// reload, but does not stop the others.
    pub async fn reload(&mut self) -> Result<()> {
        tracing::info!(
            "[ToolRegistry] Reloading {} provider(s)",
            self.providers.len()
        );

        for names in std::mem::take(&mut self.provider_tools).into_values() {
            for name in names {
                self.tools.remove(&name);
            }
        }

        let providers = self.providers.clone();
        for provider in providers {
            let fetched = match provider.refresh().await {
                Ok(()) => provider.get_tools().await,
                Err(e) => Err(e),
            };

            match fetched {
                Ok(tools) => {
                    let tools: Vec<_> = tools
                        .into_iter()
                        .filter(|t| {
                            let clash = self.tools.contains_key(t.name());
                            if clash {
                                tracing::warn!(
                                    "[ToolRegistry] Skipping '{}' from '{}': name already registered",
                                    t.name(),
                                    provider.name()
                                );
                            }
                            !clash
                        })
                        .collect();
                    self.insert_provider_tools(provider.name(), tools);
                }
                Err(e) => {
                    tracing::error!(
                        "[ToolRegistry] Failed to reload provider '{}': {}",
                        provider.name(),
                        e
                    );
                }
            }
        }

        tracing::info!("[ToolRegistry] Reload complete ({} tools)", self.tools.len());
        Ok(())
    }

    fn insert_provider_tools(&mut self, provider_name: &str, tools: Vec<Arc<dyn Tool>>) {
        let names = self
            .provider_tools
            .entry(provider_name.to_string())
            .or_default();

        for tool in tools {
            let name = tool.name().to_string();
            tracing::info!(
                "[ToolRegistry] Registering tool '{}' from provider '{}'",
                name,
                provider_name
            );
            names.push(name.clone());
            self.tools.insert(name, tool);
        }
    }

    /// Handle for requesting a reload
    pub fn reload_flag(&self) -> ReloadFlag {
        self.reload_flag.clone()
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// All tool definitions, sorted by name
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<_> = self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Levels declared by extension tools
    pub fn declared_levels(&self) -> Vec<(String, PermissionLevel)> {
        self.tools
            .iter()
            .filter_map(|(name, tool)| tool.declared_level().map(|level| (name.clone(), level)))
            .collect()
    }

    /// Get the list of tool names
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::tools::ToolResult;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    /// Tool returning a fixed string
    pub(crate) struct EchoTool {
        pub name: String,
        pub level: Option<PermissionLevel>,
    }

    impl EchoTool {
        pub(crate) fn named(name: &str) -> Arc<dyn Tool> {
            Arc::new(Self {
                name: name.to_string(),
                level: None,
            })
        }
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            "echo"
        }

        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }

        fn declared_level(&self) -> Option<PermissionLevel> {
            self.level
        }

        async fn execute(&self, input: &Value) -> Result<ToolResult> {
            Ok(ToolResult::success(format!("{}:{}", self.name, input)))
        }
    }

    struct ListProvider {
        tools: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ToolProvider for ListProvider {
        async fn get_tools(&self) -> Result<Vec<Arc<dyn Tool>>> {
            Ok(self.tools.lock().iter().map(|n| EchoTool::named(n)).collect())
        }

        fn name(&self) -> &str {
            "list"
        }
    }

    #[test]
    fn test_register_replace_remove() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.register(EchoTool::named("a")).is_none());
        assert!(registry.register(EchoTool::named("a")).is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.remove("a").is_some());
        assert!(registry.get("a").is_none());
    }

    #[tokio::test]
    async fn test_provider_conflict_leaves_registry_unchanged() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::named("x__b"));

        let provider = Arc::new(ListProvider {
            tools: Mutex::new(vec!["x__a".into(), "x__b".into()]),
        });
        assert!(registry.add_provider(provider).await.is_err());
        assert!(!registry.contains("x__a"));
    }

    #[tokio::test]
    async fn test_reload_picks_up_new_tools() {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool::named("Read"));

        let provider = Arc::new(ListProvider {
            tools: Mutex::new(vec!["x__a".into()]),
        });
        assert_eq!(registry.add_provider(provider.clone()).await.unwrap(), 1);

        *provider.tools.lock() = vec!["x__b".into(), "x__c".into()];
        registry.reload().await.unwrap();

        assert!(registry.contains("Read"));
        assert!(!registry.contains("x__a"));
        assert!(registry.contains("x__b"));
        assert!(registry.contains("x__c"));
        assert_eq!(registry.definitions()[0].name, "Read");
    }

    #[test]
    fn test_reload_flag() {
        let registry = ToolRegistry::new();
        let flag = registry.reload_flag();
        assert!(!registry.reload_flag.take());
        flag.request();
        assert!(registry.reload_flag.is_requested());
        assert!(registry.reload_flag.take());
        assert!(!registry.reload_flag.take());
    }
}
