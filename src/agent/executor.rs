//! Tool Executor
//!
//! The single gateway every provider loop dispatches tool calls through:
//!
//! 1. Unknown tool name: error result, nothing else happens
//! 2. Classify the call; anything but GREEN suspends on the consent handler
//!    (bounded by the consent timeout, which counts as a denial)
//! 3. Denial: error result, the handler never runs
//! 4. Approval: inject `_agent_id` / `_user_id` into a copy of the arguments
//!    and run the handler
//! 5. Handler errors and panics become error results; they never reach the
//!    caller's loop

use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::core::AgentId;
use crate::llm::ToolDefinition;
use crate::permissions::{
    ClassifierTables, ConsentDecision, ConsentHandler, ConsentRequest, PermissionClassifier,
    PermissionLevel,
};
use crate::tools::{
    builtin_tools, ReloadFlag, Sandbox, ToolProvider, ToolRegistry, ToolResult, AGENT_ID_FIELD,
    USER_ID_FIELD,
};

/// Default bound on a consent wait
pub const DEFAULT_CONSENT_TIMEOUT: Duration = Duration::from_secs(300);

/// Permission-gated dispatcher for one agent
pub struct ToolExecutor {
    sandbox: Sandbox,
    registry: Arc<RwLock<ToolRegistry>>,
    reload_flag: ReloadFlag,
    classifier: Arc<PermissionClassifier>,
    consent: Arc<dyn ConsentHandler>,
    agent_id: AgentId,
    user_id: Option<String>,
    consent_timeout: Duration,
}

impl ToolExecutor {
    /// Create an executor with the built-in tools and the standard tables
    pub fn new(sandbox: Sandbox, consent: Arc<dyn ConsentHandler>, agent_id: AgentId) -> Self {
        let mut registry = ToolRegistry::new();
        for tool in builtin_tools(&sandbox) {
            registry.register(tool);
        }
        let reload_flag = registry.reload_flag();

        Self {
            sandbox,
            registry: Arc::new(RwLock::new(registry)),
            reload_flag,
            classifier: Arc::new(PermissionClassifier::standard()),
            consent,
            agent_id,
            user_id: None,
            consent_timeout: DEFAULT_CONSENT_TIMEOUT,
        }
    }

    /// Use a custom registry instead of the built-in tools
    pub fn with_registry(mut self, registry: ToolRegistry) -> Self {
        self.reload_flag = registry.reload_flag();
        self.registry = Arc::new(RwLock::new(registry));
        self.sync_extension_levels_blocking();
        self
    }

    /// Classify against the given tables
    pub fn with_tables(mut self, tables: Arc<ClassifierTables>) -> Self {
        self.classifier = Arc::new(PermissionClassifier::new(tables));
        self.sync_extension_levels_blocking();
        self
    }

    /// Set the owning user
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Bound consent waits
    pub fn with_consent_timeout(mut self, timeout: Duration) -> Self {
        self.consent_timeout = timeout;
        self
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.agent_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn classifier(&self) -> &Arc<PermissionClassifier> {
        &self.classifier
    }

    pub fn consent_handler(&self) -> Arc<dyn ConsentHandler> {
        self.consent.clone()
    }

    /// Handle for requesting a registry reload before the next dispatch
    pub fn reload_flag(&self) -> ReloadFlag {
        self.reload_flag.clone()
    }

    /// Add a dynamic tool provider
    pub async fn add_provider(&self, provider: Arc<dyn ToolProvider>) -> anyhow::Result<usize> {
        let mut registry = self.registry.write().await;
        let count = registry.add_provider(provider).await?;
        self.sync_extension_levels(&registry);
        Ok(count)
    }

    /// Re-fetch provider tools now
    pub async fn reload(&self) -> anyhow::Result<()> {
        let mut registry = self.registry.write().await;
        registry.reload().await?;
        self.sync_extension_levels(&registry);
        Ok(())
    }

    /// Tool definitions to advertise to the model
    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry.read().await.definitions()
    }

    /// Classify a call without executing it
    pub fn classify(&self, tool_name: &str, input: &Value) -> PermissionLevel {
        self.classifier.classify(tool_name, input)
    }

    fn sync_extension_levels(&self, registry: &ToolRegistry) {
        self.classifier.clear_extensions();
        for (name, level) in registry.declared_levels() {
            self.classifier.register_extension(name, level);
        }
    }

    fn sync_extension_levels_blocking(&self) {
        // Builders run before the registry is shared, so the lock is free
        if let Ok(registry) = self.registry.try_read() {
            self.sync_extension_levels(&registry);
        }
    }

    async fn reload_if_requested(&self) {
        if self.reload_flag.take() {
            tracing::info!("[Executor] Reload requested, refreshing tool registry");
            if let Err(e) = self.reload().await {
                tracing::error!("[Executor] Tool reload failed: {}", e);
            }
        }
    }

    /// Permission gate without dispatch
    ///
    /// Used directly by backends whose tools run elsewhere (the managed
    /// client asks before running its own tools).
    pub async fn authorize(&self, tool_name: &str, input: &Value) -> ConsentDecision {
        let level = self.classifier.classify(tool_name, input);
        if !level.requires_consent() {
            tracing::debug!("[Executor] {} auto-approved ({})", tool_name, level);
            return ConsentDecision::Granted;
        }

        let request = ConsentRequest {
            tool_name: tool_name.to_string(),
            input: input.clone(),
            level,
            reason: self.classifier.reason_for_danger(tool_name, input),
            agent_id: self.agent_id.to_string(),
        };

        tracing::info!(
            "[Executor] Requesting consent for {} ({}) from agent {}",
            tool_name,
            level,
            self.agent_id
        );

        match tokio::time::timeout(self.consent_timeout, self.consent.decide(&request)).await {
            Ok(decision) => {
                tracing::info!("[Executor] Consent for {}: {:?}", tool_name, decision);
                decision
            }
            Err(_) => {
                tracing::warn!(
                    "[Executor] Consent for {} timed out after {:?}",
                    tool_name,
                    self.consent_timeout
                );
                ConsentDecision::Denied
            }
        }
    }

    /// Execute a tool call through the permission gate
    pub async fn execute(&self, tool_name: &str, args: &Value) -> ToolResult {
        self.reload_if_requested().await;

        let Some(tool) = self.registry.read().await.get(tool_name) else {
            tracing::warn!("[Executor] Unknown tool: {}", tool_name);
            return ToolResult::error(format!("Unknown tool: {}", tool_name));
        };

        // The model never gets to set control fields
        let mut input = match args {
            Value::Object(map) => map.clone(),
            Value::Null => serde_json::Map::new(),
            other => {
                return ToolResult::error(format!(
                    "Invalid arguments for {}: expected an object, got {}",
                    tool_name, other
                ));
            }
        };
        input.remove(AGENT_ID_FIELD);
        input.remove(USER_ID_FIELD);
        let model_input = Value::Object(input.clone());

        if !self.authorize(tool_name, &model_input).await.is_granted() {
            return ToolResult::error(format!("Permission denied for tool: {}", tool_name));
        }

        input.insert(
            AGENT_ID_FIELD.to_string(),
            Value::String(self.agent_id.to_string()),
        );
        if let Some(user_id) = &self.user_id {
            input.insert(USER_ID_FIELD.to_string(), Value::String(user_id.clone()));
        }
        let input = Value::Object(input);

        tracing::info!("[Executor] Executing tool: {}", tool_name);
        tracing::debug!("[Executor] Input: {}", model_input);

        let result = match AssertUnwindSafe(tool.execute(&input)).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ToolResult::error(format!("Tool execution failed: {:#}", e)),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("[Executor] Tool {} panicked: {}", tool_name, message);
                ToolResult::error(format!("Tool execution failed: {} panicked: {}", tool_name, message))
            }
        };

        tracing::debug!(
            "[Executor] Tool {} completed. Is error: {}",
            tool_name,
            result.is_error
        );

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{consent_fn, AutoApprove, DenyAll};
    use crate::tools::{Tool, EchoTool};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every input it receives
    struct RecordingTool {
        name: &'static str,
        calls: Arc<Mutex<Vec<Value>>>,
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "records"
        }
        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, input: &Value) -> anyhow::Result<ToolResult> {
            self.calls.lock().push(input.clone());
            Ok(ToolResult::success("recorded"))
        }
    }

    struct PanickingTool;

    #[async_trait]
    impl Tool for PanickingTool {
        fn name(&self) -> &str {
            "Explode"
        }
        fn description(&self) -> &str {
            "panics"
        }
        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, _input: &Value) -> anyhow::Result<ToolResult> {
            panic!("boom");
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "Fail"
        }
        fn description(&self) -> &str {
            "fails"
        }
        fn input_schema(&self) -> Value {
            json!({ "type": "object" })
        }
        async fn execute(&self, _input: &Value) -> anyhow::Result<ToolResult> {
            anyhow::bail!("disk on fire")
        }
    }

    fn counting_consent(grant: bool) -> (Arc<dyn ConsentHandler>, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();
        let handler = consent_fn(move |_req: ConsentRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { ConsentDecision::from(grant) }
        });
        (Arc::new(handler), count)
    }

    fn executor_with(
        consent: Arc<dyn ConsentHandler>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> (tempfile::TempDir, ToolExecutor) {
        let dir = tempfile::tempdir().unwrap();
        let mut registry = ToolRegistry::new();
        for tool in tools {
            registry.register(tool);
        }
        let executor = ToolExecutor::new(
            Sandbox::new(dir.path()).unwrap(),
            consent,
            AgentId::root("main").unwrap(),
        )
        .with_registry(registry)
        .with_user_id("user-1");
        (dir, executor)
    }

    #[tokio::test]
    async fn test_green_tools_never_ask() {
        let (consent, asked) = counting_consent(false);
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_dir, executor) = executor_with(
            consent,
            vec![
                Arc::new(RecordingTool { name: "Read", calls: calls.clone() }),
                Arc::new(RecordingTool { name: "Glob", calls: calls.clone() }),
                Arc::new(RecordingTool { name: "Bash", calls: calls.clone() }),
            ],
        );

        assert!(!executor.execute("Read", &json!({ "file_path": "a" })).await.is_error);
        assert!(!executor.execute("Glob", &json!({ "pattern": "*" })).await.is_error);
        assert!(!executor.execute("Bash", &json!({ "command": "" })).await.is_error);
        assert_eq!(asked.load(Ordering::SeqCst), 0);
        assert_eq!(calls.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_tool_has_no_side_effect() {
        let (consent, asked) = counting_consent(true);
        let (_dir, executor) = executor_with(consent, vec![]);

        let result = executor.execute("Nope", &json!({})).await;
        assert!(result.is_error);
        assert!(result.content.contains("Unknown tool"));
        assert_eq!(asked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_denial_skips_handler() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_dir, executor) = executor_with(
            Arc::new(DenyAll),
            vec![Arc::new(RecordingTool { name: "Write", calls: calls.clone() })],
        );

        let result = executor
            .execute("Write", &json!({ "file_path": "a", "content": "b" }))
            .await;
        assert!(result.is_error);
        assert!(result.content.contains("Permission denied"));
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_red_request_carries_reason() {
        let seen = Arc::new(Mutex::new(None));
        let recorder = seen.clone();
        let consent = consent_fn(move |req: ConsentRequest| {
            *recorder.lock() = Some((req.level, req.reason.clone()));
            async { ConsentDecision::Denied }
        });
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_dir, executor) = executor_with(
            Arc::new(consent),
            vec![Arc::new(RecordingTool { name: "Bash", calls })],
        );

        executor.execute("Bash", &json!({ "command": "rm -rf /" })).await;
        let (level, reason) = seen.lock().clone().unwrap();
        assert_eq!(level, PermissionLevel::Red);
        assert!(reason.unwrap().contains("deletion"));
    }

    #[tokio::test]
    async fn test_consent_timeout_is_denial() {
        let consent = consent_fn(|_req: ConsentRequest| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            ConsentDecision::Granted
        });
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_dir, executor) = executor_with(
            Arc::new(consent),
            vec![Arc::new(RecordingTool { name: "Write", calls: calls.clone() })],
        );
        let executor = executor.with_consent_timeout(Duration::from_millis(50));

        let result = executor.execute("Write", &json!({})).await;
        assert!(result.is_error);
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_control_fields_injected_and_not_spoofable() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let (_dir, executor) = executor_with(
            Arc::new(AutoApprove),
            vec![Arc::new(RecordingTool { name: "Write", calls: calls.clone() })],
        );

        let result = executor
            .execute(
                "Write",
                &json!({ "file_path": "a", "_agent_id": "spoofed", "_user_id": "mallory" }),
            )
            .await;
        assert!(!result.is_error);

        let seen = calls.lock()[0].clone();
        assert_eq!(seen["_agent_id"], "main");
        assert_eq!(seen["_user_id"], "user-1");
        assert_eq!(seen["file_path"], "a");
    }

    #[tokio::test]
    async fn test_handler_failures_become_results() {
        let (_dir, executor) = executor_with(
            Arc::new(AutoApprove),
            vec![Arc::new(PanickingTool), Arc::new(FailingTool)],
        );

        let result = executor.execute("Explode", &json!({})).await;
        assert!(result.is_error);
        assert!(result.content.contains("boom"));

        let result = executor.execute("Fail", &json!({})).await;
        assert!(result.is_error);
        assert!(result.content.contains("disk on fire"));
    }

    #[tokio::test]
    async fn test_extension_level_is_inherited() {
        let (consent, asked) = counting_consent(true);
        let (_dir, executor) = executor_with(
            consent,
            vec![Arc::new(EchoTool {
                name: "weather__forecast".into(),
                level: Some(PermissionLevel::Green),
            })],
        );

        assert!(!executor.execute("weather__forecast", &json!({})).await.is_error);
        assert_eq!(asked.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reload_flag_is_observed() {
        struct Late {
            ready: Arc<std::sync::atomic::AtomicBool>,
        }

        #[async_trait]
        impl ToolProvider for Late {
            async fn get_tools(&self) -> anyhow::Result<Vec<Arc<dyn Tool>>> {
                if self.ready.load(Ordering::SeqCst) {
                    Ok(vec![EchoTool::named("late__tool")])
                } else {
                    Ok(vec![])
                }
            }
            fn name(&self) -> &str {
                "late"
            }
        }

        let ready = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let (_dir, executor) = executor_with(Arc::new(AutoApprove), vec![]);
        executor
            .add_provider(Arc::new(Late { ready: ready.clone() }))
            .await
            .unwrap();

        assert!(executor.execute("late__tool", &json!({})).await.is_error);

        ready.store(true, Ordering::SeqCst);
        executor.reload_flag().request();
        assert!(!executor.execute("late__tool", &json!({})).await.is_error);
    }
}
