//! Console Renderer - Renders normalized events to the terminal
//!
//! The renderer is an opt-in front-end: it only consumes [`NormalizedEvent`]s
//! (or [`AgentEvent`]s from the sub-agent sink) and never talks to a
//! provider directly, so it can be swapped for a WebSocket or chat front-end.

use futures::{Stream, StreamExt};

use crate::core::{NormalizedEvent, ResultPayload};
use crate::runtime::AgentEvent;

use super::console::Console;

/// Console renderer for one event stream
///
/// # Example
///
/// ```ignore
/// provider.send(&prompt, vec![]).await?;
/// let mut renderer = ConsoleRenderer::new();
/// let result = renderer.run(provider.stream()).await;
/// ```
pub struct ConsoleRenderer {
    console: Console,

    /// Whether to show tool execution details
    show_tools: bool,

    /// Whether to print cost and usage after the result
    show_summary: bool,

    in_text: bool,
}

impl ConsoleRenderer {
    pub fn new() -> Self {
        Self::with_console(Console::new())
    }

    pub fn with_console(console: Console) -> Self {
        Self {
            console,
            show_tools: true,
            show_summary: true,
            in_text: false,
        }
    }

    pub fn show_tools(mut self, show: bool) -> Self {
        self.show_tools = show;
        self
    }

    pub fn show_summary(mut self, show: bool) -> Self {
        self.show_summary = show;
        self
    }

    fn end_text(&mut self) {
        if self.in_text {
            self.console.println();
            self.in_text = false;
        }
    }

    /// Render one event of the top-level agent
    pub fn render(&mut self, event: &NormalizedEvent) {
        self.render_for(None, event);
    }

    /// Render one event tagged with the sub-agent that produced it
    pub fn render_agent_event(&mut self, event: &AgentEvent) {
        self.render_for(Some(event.agent_id.as_str()), &event.event);
    }

    fn render_for(&mut self, agent: Option<&str>, event: &NormalizedEvent) {
        match event {
            NormalizedEvent::ModelInfo { model } => {
                tracing::debug!("[Console] Model: {}", model);
            }
            NormalizedEvent::AssistantText { text } => {
                if !self.in_text {
                    self.console.print_assistant_prefix(agent);
                    self.in_text = true;
                }
                self.console.print_assistant_chunk(text);
            }
            NormalizedEvent::ToolUse { name, input, .. } => {
                self.end_text();
                if self.show_tools {
                    self.console.print_tool_action(name, &summarize_input(input));
                }
            }
            NormalizedEvent::ToolResult {
                content, is_error, ..
            } => {
                if self.show_tools {
                    self.console.print_tool_result(content, *is_error);
                }
            }
            NormalizedEvent::Status { message } => {
                self.end_text();
                self.console.print_system(message);
            }
            NormalizedEvent::Result(result) => {
                self.end_text();
                if self.show_summary {
                    self.console.print_separator();
                    self.console.print_system(&summary_line(result));
                }
            }
            NormalizedEvent::Error { message } => {
                self.end_text();
                self.console.print_error(message);
            }
        }
    }

    /// Render a whole stream; returns the result payload, if any
    pub async fn run<S>(&mut self, events: S) -> Option<ResultPayload>
    where
        S: Stream<Item = NormalizedEvent> + Unpin,
    {
        let mut events = events;
        let mut result = None;
        while let Some(event) = events.next().await {
            self.render(&event);
            if let NormalizedEvent::Result(payload) = event {
                result = Some(payload);
            }
        }
        self.end_text();
        result
    }

    pub fn console(&self) -> &Console {
        &self.console
    }
}

impl Default for ConsoleRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// One-line view of a tool input
fn summarize_input(input: &serde_json::Value) -> String {
    for key in ["command", "file_path", "pattern", "path", "url"] {
        if let Some(value) = input.get(key).and_then(|v| v.as_str()) {
            return value.to_string();
        }
    }
    let text = input.to_string();
    match text.char_indices().nth(80) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text,
    }
}

fn summary_line(result: &ResultPayload) -> String {
    let mut line = format!(
        "{} turns, {:.1}s, ${:.4} ({} in / {} out tokens)",
        result.num_turns,
        result.duration_ms as f64 / 1000.0,
        result.cost_usd,
        result.usage.input_tokens,
        result.usage.output_tokens
    );
    if let Some(session) = &result.session_id {
        line.push_str(&format!(", session {}", session));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Usage;
    use serde_json::json;

    #[test]
    fn test_summarize_input() {
        assert_eq!(summarize_input(&json!({ "command": "ls -la" })), "ls -la");
        assert_eq!(summarize_input(&json!({ "file_path": "src/main.rs" })), "src/main.rs");
        assert_eq!(summarize_input(&json!({ "x": 1 })), r#"{"x":1}"#);
    }

    #[test]
    fn test_summary_line() {
        let result = ResultPayload {
            text: String::new(),
            session_id: Some("s1".into()),
            cost_usd: 0.0123,
            duration_ms: 1500,
            num_turns: 2,
            is_error: false,
            usage: Usage::new(10, 5),
        };
        assert_eq!(
            summary_line(&result),
            "2 turns, 1.5s, $0.0123 (10 in / 5 out tokens), session s1"
        );
    }

    #[tokio::test]
    async fn test_run_returns_result() {
        let payload = ResultPayload {
            text: "done".into(),
            session_id: None,
            cost_usd: 0.0,
            duration_ms: 1,
            num_turns: 1,
            is_error: false,
            usage: Usage::default(),
        };
        let events = futures::stream::iter(vec![
            NormalizedEvent::text("hi"),
            NormalizedEvent::Result(payload.clone()),
        ]);

        let mut renderer = ConsoleRenderer::new().show_summary(false);
        assert_eq!(renderer.run(events).await, Some(payload));
    }
}
