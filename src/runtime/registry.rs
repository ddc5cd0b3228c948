//! Agent Registry
//!
//! Maps agent ids to their live provider, working directory and background
//! task. The top-level caller owns it; the supervisor holds a clone and adds
//! or removes sub-agent entries. At most one provider per id.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::AbortHandle;

use crate::core::{AgentId, FrameworkError, FrameworkResult};
use crate::provider::Provider;

struct RegistryEntry {
    provider: Arc<dyn Provider>,
    working_dir: PathBuf,
    task: Option<AbortHandle>,
}

/// Cloneable shared handle to the agent registry
#[derive(Clone, Default)]
pub struct AgentRegistry {
    entries: Arc<RwLock<HashMap<AgentId, RegistryEntry>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an agent; a live entry for the same id is an error
    pub fn register(
        &self,
        id: AgentId,
        provider: Arc<dyn Provider>,
        working_dir: impl Into<PathBuf>,
    ) -> FrameworkResult<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&id) {
            return Err(FrameworkError::AgentAlreadyRegistered(id.to_string()));
        }
        tracing::debug!("[Registry] Registered {}", id);
        entries.insert(
            id,
            RegistryEntry {
                provider,
                working_dir: working_dir.into(),
                task: None,
            },
        );
        Ok(())
    }

    /// Remember the background task running this agent
    pub fn attach_task(&self, id: &AgentId, task: AbortHandle) {
        if let Some(entry) = self.entries.write().get_mut(id) {
            entry.task = Some(task);
        }
    }

    /// Drop an entry and hand back its provider for disconnection
    pub fn remove(&self, id: &AgentId) -> Option<Arc<dyn Provider>> {
        let removed = self.entries.write().remove(id);
        if removed.is_some() {
            tracing::debug!("[Registry] Removed {}", id);
        }
        removed.map(|entry| entry.provider)
    }

    pub fn get(&self, id: &AgentId) -> Option<Arc<dyn Provider>> {
        self.entries.read().get(id).map(|e| e.provider.clone())
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.entries.read().contains_key(id)
    }

    pub fn working_dir(&self, id: &AgentId) -> Option<PathBuf> {
        self.entries.read().get(id).map(|e| e.working_dir.clone())
    }

    pub(crate) fn abort_handle(&self, id: &AgentId) -> Option<AbortHandle> {
        self.entries.read().get(id).and_then(|e| e.task.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<AgentId> {
        let mut ids: Vec<AgentId> = self.entries.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
