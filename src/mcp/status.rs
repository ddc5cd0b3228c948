//! Shared connection status of auxiliary servers

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Connection state of one auxiliary server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AuxServerStatus {
    Connected,
    Failed(String),
}

impl AuxServerStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, AuxServerStatus::Connected)
    }
}

/// Name -> status map shared between a provider and whoever reports on it
#[derive(Debug, Clone, Default)]
pub struct AuxServerStatusMap {
    inner: Arc<RwLock<BTreeMap<String, AuxServerStatus>>>,
}

impl AuxServerStatusMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_connected(&self, name: &str) {
        self.inner
            .write()
            .insert(name.to_string(), AuxServerStatus::Connected);
    }

    pub fn mark_failed(&self, name: &str, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("[AuxServers] '{}' unavailable: {}", name, reason);
        self.inner
            .write()
            .insert(name.to_string(), AuxServerStatus::Failed(reason));
    }

    pub fn get(&self, name: &str) -> Option<AuxServerStatus> {
        self.inner.read().get(name).cloned()
    }

    /// Names currently recorded as failed
    pub fn failed(&self) -> Vec<String> {
        self.inner
            .read()
            .iter()
            .filter(|(_, status)| !status.is_connected())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Names currently recorded as connected
    pub fn connected(&self) -> Vec<String> {
        self.inner
            .read()
            .iter()
            .filter(|(_, status)| status.is_connected())
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn snapshot(&self) -> BTreeMap<String, AuxServerStatus> {
        self.inner.read().clone()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }
}
