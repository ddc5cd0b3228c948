//! Consent callbacks
//!
//! The executor suspends on a [`ConsentHandler`] for every non-GREEN tool
//! call. Front-ends (console, WebSocket, chat bots) supply the handler; the
//! engine only sees the final decision.
//!
//! # Example
//!
//! ```ignore
//! use shadow_agent_engine::permissions::{consent_fn, ConsentDecision};
//!
//! let handler = consent_fn(|request| async move {
//!     if request.level.requires_confirmation() {
//!         ConsentDecision::Denied
//!     } else {
//!         ConsentDecision::Granted
//!     }
//! });
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;

use super::level::PermissionLevel;

/// Outcome of a consent request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentDecision {
    Granted,
    Denied,
}

impl ConsentDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, ConsentDecision::Granted)
    }
}

impl From<bool> for ConsentDecision {
    fn from(granted: bool) -> Self {
        if granted {
            ConsentDecision::Granted
        } else {
            ConsentDecision::Denied
        }
    }
}

/// Everything a front-end needs to ask a human about one tool call
#[derive(Debug, Clone, Serialize)]
pub struct ConsentRequest {
    pub tool_name: String,
    pub input: Value,
    pub level: PermissionLevel,
    /// Explanation for RED classifications
    pub reason: Option<String>,
    /// Agent that issued the call
    pub agent_id: String,
}

/// Async consent callback
#[async_trait]
pub trait ConsentHandler: Send + Sync {
    /// Decide whether the tool call may run. May suspend awaiting a human.
    async fn decide(&self, request: &ConsentRequest) -> ConsentDecision;
}

/// Wrapper to implement ConsentHandler for async closures
pub struct FnConsentHandler<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> ConsentHandler for FnConsentHandler<F>
where
    F: Fn(ConsentRequest) -> Fut + Send + Sync,
    Fut: Future<Output = ConsentDecision> + Send + 'static,
{
    async fn decide(&self, request: &ConsentRequest) -> ConsentDecision {
        (self.func)(request.clone()).await
    }
}

/// Create a consent handler from an async closure
pub fn consent_fn<F, Fut>(func: F) -> FnConsentHandler<F>
where
    F: Fn(ConsentRequest) -> Fut + Send + Sync,
    Fut: Future<Output = ConsentDecision> + Send + 'static,
{
    FnConsentHandler { func }
}

/// Grants every request (headless runs and tests)
pub struct AutoApprove;

#[async_trait]
impl ConsentHandler for AutoApprove {
    async fn decide(&self, request: &ConsentRequest) -> ConsentDecision {
        tracing::debug!("[Consent] Auto-approving {} ({})", request.tool_name, request.level);
        ConsentDecision::Granted
    }
}

/// Denies every request
pub struct DenyAll;

#[async_trait]
impl ConsentHandler for DenyAll {
    async fn decide(&self, request: &ConsentRequest) -> ConsentDecision {
        tracing::debug!("[Consent] Denying {} ({})", request.tool_name, request.level);
        ConsentDecision::Denied
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(level: PermissionLevel) -> ConsentRequest {
        ConsentRequest {
            tool_name: "Bash".to_string(),
            input: json!({ "command": "ls" }),
            level,
            reason: None,
            agent_id: "main".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fn_handler() {
        let handler = consent_fn(|req: ConsentRequest| async move {
            ConsentDecision::from(!req.level.requires_confirmation())
        });

        assert_eq!(
            handler.decide(&request(PermissionLevel::Yellow)).await,
            ConsentDecision::Granted
        );
        assert_eq!(
            handler.decide(&request(PermissionLevel::Red)).await,
            ConsentDecision::Denied
        );
    }

    #[tokio::test]
    async fn test_fixed_handlers() {
        assert!(AutoApprove
            .decide(&request(PermissionLevel::Red))
            .await
            .is_granted());
        assert!(!DenyAll
            .decide(&request(PermissionLevel::Yellow))
            .await
            .is_granted());
    }
}
