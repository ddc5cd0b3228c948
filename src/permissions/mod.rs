//! Permission policy for tool execution
//!
//! Every tool call is classified into a [`PermissionLevel`] before it runs:
//!
//! - **GREEN**: auto-approved (read-only tools, empty shell commands)
//! - **YELLOW**: requires consent (mutating tools, ordinary shell commands,
//!   unknown tools)
//! - **RED**: requires consent plus a secondary confirmation (shell commands
//!   matching a destructive pattern)
//! - **COMPUTER**: requires consent (screen control)
//!
//! ## Example
//!
//! ```rust,ignore
//! use shadow_agent_engine::permissions::{PermissionClassifier, PermissionLevel};
//! use serde_json::json;
//!
//! let classifier = PermissionClassifier::standard();
//! let level = classifier.classify("Bash", &json!({ "command": "rm -rf /" }));
//! assert_eq!(level, PermissionLevel::Red);
//! ```

mod classifier;
mod consent;
mod level;
mod rules;

pub use classifier::PermissionClassifier;
pub use consent::{
    consent_fn, AutoApprove, ConsentDecision, ConsentHandler, ConsentRequest, DenyAll,
    FnConsentHandler,
};
pub use level::PermissionLevel;
pub use rules::{ClassifierTables, DangerRule};
