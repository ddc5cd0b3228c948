//! Hierarchical agent identifiers
//!
//! A top-level agent has a plain id (`main`). Sub-agents append their short
//! name after a separator (`main/researcher/fetcher`), so depth and ancestry
//! can be read off the id itself.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::{FrameworkError, FrameworkResult};

/// Separator between hierarchy segments
pub const SEPARATOR: char = '/';

/// Hierarchical agent identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AgentId(String);

impl AgentId {
    /// Parse an id, rejecting empty segments
    pub fn parse(raw: impl Into<String>) -> FrameworkResult<Self> {
        let raw = raw.into();
        if raw.is_empty() || raw.split(SEPARATOR).any(|segment| segment.trim().is_empty()) {
            return Err(FrameworkError::InvalidAgentId(raw));
        }
        Ok(Self(raw))
    }

    /// Build a top-level id (the separator is not allowed inside it)
    pub fn root(name: &str) -> FrameworkResult<Self> {
        if name.contains(SEPARATOR) {
            return Err(FrameworkError::InvalidAgentId(name.to_string()));
        }
        Self::parse(name)
    }

    /// Id of a direct child with the given short name
    pub fn child(&self, short_name: &str) -> AgentId {
        AgentId(format!("{}{}{}", self.0, SEPARATOR, short_name))
    }

    /// Number of separators in the id (0 for top-level agents)
    pub fn depth(&self) -> usize {
        self.0.matches(SEPARATOR).count()
    }

    /// Parent id, if this is a sub-agent
    pub fn parent(&self) -> Option<AgentId> {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(parent, _)| AgentId(parent.to_string()))
    }

    /// Last segment of the id
    pub fn short_name(&self) -> &str {
        self.0
            .rsplit_once(SEPARATOR)
            .map(|(_, name)| name)
            .unwrap_or(&self.0)
    }

    /// Top-level ancestor (the id itself for top-level agents)
    pub fn root_id(&self) -> AgentId {
        let root = self.0.split(SEPARATOR).next().unwrap_or(&self.0);
        AgentId(root.to_string())
    }

    /// All ancestors, nearest first
    pub fn ancestors(&self) -> Vec<AgentId> {
        let mut out = Vec::new();
        let mut current = self.parent();
        while let Some(id) = current {
            current = id.parent();
            out.push(id);
        }
        out
    }

    /// True if `self` sits strictly below `ancestor`
    pub fn is_descendant_of(&self, ancestor: &AgentId) -> bool {
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0[ancestor.0.len()..].starts_with(SEPARATOR)
    }

    /// Borrow as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Default for AgentId {
    /// The conventional top-level agent, `main`
    fn default() -> Self {
        AgentId("main".to_string())
    }
}

impl TryFrom<String> for AgentId {
    type Error = FrameworkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        AgentId::parse(value)
    }
}

impl From<AgentId> for String {
    fn from(id: AgentId) -> Self {
        id.0
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
