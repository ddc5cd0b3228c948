//! Terminal front-end
//!
//! - `Console` - colored terminal output and prompts
//! - `ConsoleConsent` - consent handler that asks on stdin
//! - `ConsoleRenderer` - renders a normalized event stream

mod console;
mod renderer;

pub use console::{parse_consent_answer, Console, ConsoleConsent};
pub use renderer::ConsoleRenderer;
