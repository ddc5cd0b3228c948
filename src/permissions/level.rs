//! Permission levels

use serde::{Deserialize, Serialize};

/// Access level assigned to every tool call before execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermissionLevel {
    /// Auto-approved
    Green,
    /// Requires consent
    Yellow,
    /// Requires consent plus secondary confirmation
    Red,
    /// Requires consent (screen control)
    Computer,
}

impl PermissionLevel {
    /// Whether the consent handler must be consulted
    pub fn requires_consent(&self) -> bool {
        !matches!(self, PermissionLevel::Green)
    }

    /// Whether a secondary confirmation is expected on top of consent
    pub fn requires_confirmation(&self) -> bool {
        matches!(self, PermissionLevel::Red)
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionLevel::Green => write!(f, "GREEN"),
            PermissionLevel::Yellow => write!(f, "YELLOW"),
            PermissionLevel::Red => write!(f, "RED"),
            PermissionLevel::Computer => write!(f, "COMPUTER"),
        }
    }
}
