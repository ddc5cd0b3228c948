//! Agentic loop states

use serde::{Deserialize, Serialize};

/// State of the generic agentic loop for one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoopState {
    /// Sending the conversation to the backend
    #[default]
    Sending,

    /// Receiving text deltas and tool-call fragments
    StreamingText,

    /// Stream ended, assembling requested tool calls
    AwaitingTools,

    /// Dispatching tool calls through the executor
    ExecutingTools,

    /// Loop finished (result or error emitted)
    Done,
}

impl LoopState {
    /// Check if the loop has finished
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Done)
    }

    /// Check if the loop is waiting on the backend
    pub fn is_waiting_on_backend(&self) -> bool {
        matches!(self, LoopState::Sending | LoopState::StreamingText)
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopState::Sending => write!(f, "Sending"),
            LoopState::StreamingText => write!(f, "Streaming"),
            LoopState::AwaitingTools => write!(f, "Awaiting tools"),
            LoopState::ExecutingTools => write!(f, "Executing tools"),
            LoopState::Done => write!(f, "Done"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_checks() {
        assert!(LoopState::Done.is_terminal());
        assert!(!LoopState::ExecutingTools.is_terminal());
        assert!(LoopState::StreamingText.is_waiting_on_backend());
        assert_eq!(LoopState::default(), LoopState::Sending);
        assert_eq!(LoopState::AwaitingTools.to_string(), "Awaiting tools");
    }
}
