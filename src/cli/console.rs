use async_trait::async_trait;
use colored::*;
use std::io::{self, Write};

use crate::permissions::{ConsentDecision, ConsentHandler, ConsentRequest, PermissionLevel};

const MAX_TOOL_OUTPUT: usize = 500;

/// Console handles all terminal I/O with colored formatting
#[derive(Debug, Clone)]
pub struct Console {
    user_color: Color,
    assistant_color: Color,
    tool_color: Color,
}

impl Console {
    /// Create a new Console with default colors
    pub fn new() -> Self {
        Self::with_colors(Color::Cyan, Color::Green, Color::Magenta)
    }

    /// Create a new Console with custom colors
    pub fn with_colors(user_color: Color, assistant_color: Color, tool_color: Color) -> Self {
        Self {
            user_color,
            assistant_color,
            tool_color,
        }
    }

    pub fn print_user(&self, message: &str) {
        println!("{} {}", "User:".color(self.user_color).bold(), message);
    }

    /// Print an assistant message prefix (without newline)
    pub fn print_assistant_prefix(&self, agent: Option<&str>) {
        match agent {
            Some(agent) => print!(
                "{} ",
                format!("[{}]", agent).color(self.assistant_color).bold()
            ),
            None => print!("{} ", "Assistant:".color(self.assistant_color).bold()),
        }
        let _ = io::stdout().flush();
    }

    /// Print a chunk of assistant response (for streaming)
    pub fn print_assistant_chunk(&self, chunk: &str) {
        print!("{}", chunk.color(self.assistant_color));
        let _ = io::stdout().flush();
    }

    pub fn println(&self) {
        println!();
    }

    /// Print a system message (status, model, cost)
    pub fn print_system(&self, message: &str) {
        println!("{} {}", "System:".yellow().bold(), message);
    }

    pub fn print_error(&self, error: &str) {
        eprintln!("{} {}", "Error:".red().bold(), error);
    }

    pub fn print_separator(&self) {
        println!("{}", "-".repeat(60).bright_black());
    }

    pub fn print_tool_action(&self, tool_name: &str, action: &str) {
        println!(
            "{} {} {}",
            "Tool:".color(self.tool_color).bold(),
            format!("[{}]", tool_name).color(self.tool_color),
            action
        );
    }

    pub fn print_tool_result(&self, result: &str, is_error: bool) {
        if is_error {
            println!("{} {}", "Tool Error:".red().bold(), result);
        } else {
            println!("{}", truncate_output(result).bright_black());
        }
    }

    /// Ask whether a tool call may run
    ///
    /// RED calls need the full word `yes`; everything else accepts `y`.
    pub fn ask_consent(&self, request: &ConsentRequest) -> io::Result<ConsentDecision> {
        println!();
        println!("{}", "─".repeat(60).yellow());
        println!(
            "{} {} wants to use {} ({})",
            "Permission Required:".yellow().bold(),
            request.agent_id,
            request.tool_name.color(self.tool_color).bold(),
            level_label(request.level)
        );
        if let Some(reason) = &request.reason {
            println!("  {} {}", "Danger:".red().bold(), reason);
        }
        let input = serde_json::to_string_pretty(&request.input).unwrap_or_default();
        for line in truncate_output(&input).lines() {
            println!("  {}", line.bright_black());
        }
        println!("{}", "─".repeat(60).yellow());

        let prompt = if request.level.requires_confirmation() {
            "Type 'yes' to allow:"
        } else {
            "Allow? (y/n):"
        };
        print!("{} ", prompt.yellow().bold());
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;
        let decision = parse_consent_answer(request.level, &input);

        match decision {
            ConsentDecision::Granted => println!("{}", "✓ Allowed".green()),
            ConsentDecision::Denied => println!("{}", "✗ Denied".red()),
        }
        println!();

        Ok(decision)
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

fn level_label(level: PermissionLevel) -> ColoredString {
    match level {
        PermissionLevel::Green => "green".green(),
        PermissionLevel::Yellow => "yellow".yellow(),
        PermissionLevel::Red => "red".red().bold(),
        PermissionLevel::Computer => "screen control".magenta(),
    }
}

fn truncate_output(text: &str) -> String {
    match text.char_indices().nth(MAX_TOOL_OUTPUT) {
        Some((idx, _)) => format!("{}...\n(output truncated)", &text[..idx]),
        None => text.to_string(),
    }
}

/// Map a typed answer to a decision
pub fn parse_consent_answer(level: PermissionLevel, answer: &str) -> ConsentDecision {
    let answer = answer.trim().to_lowercase();
    let granted = if level.requires_confirmation() {
        answer == "yes"
    } else {
        matches!(answer.as_str(), "y" | "yes")
    };
    granted.into()
}

/// Consent handler that asks on the terminal
#[derive(Debug, Clone, Default)]
pub struct ConsoleConsent {
    console: Console,
}

impl ConsoleConsent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_console(console: Console) -> Self {
        Self { console }
    }
}

#[async_trait]
impl ConsentHandler for ConsoleConsent {
    async fn decide(&self, request: &ConsentRequest) -> ConsentDecision {
        let console = self.console.clone();
        let request = request.clone();
        match tokio::task::spawn_blocking(move || console.ask_consent(&request)).await {
            Ok(Ok(decision)) => decision,
            Ok(Err(e)) => {
                tracing::warn!("[Console] Could not read consent answer: {}", e);
                ConsentDecision::Denied
            }
            Err(e) => {
                tracing::warn!("[Console] Consent prompt failed: {}", e);
                ConsentDecision::Denied
            }
        }
    }
}
