//! Sub-agent records
//!
//! A record is created inside `spawn`, moves `pending -> running` right
//! before its routine starts, and reaches exactly one terminal status. The
//! completion signal fires once, whoever gets there first.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::core::AgentId;

/// Lifecycle status of a sub-agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubAgentStatus {
    Pending,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl SubAgentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubAgentStatus::Completed | SubAgentStatus::Error | SubAgentStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubAgentStatus::Pending => "pending",
            SubAgentStatus::Running => "running",
            SubAgentStatus::Completed => "completed",
            SubAgentStatus::Error => "error",
            SubAgentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SubAgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubAgentInfo {
    pub id: AgentId,
    pub parent: AgentId,
    pub short_name: String,
    pub task: String,
    pub status: SubAgentStatus,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct RecordState {
    status: SubAgentStatus,
    result: Option<String>,
    error: Option<String>,
}

/// Book-keeping for one sub-agent
#[derive(Debug)]
pub struct SubAgentRecord {
    pub id: AgentId,
    pub parent: AgentId,
    pub short_name: String,
    pub task: String,
    pub created_at: DateTime<Utc>,
    pub timeout: Option<Duration>,
    state: Mutex<RecordState>,
    done: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl SubAgentRecord {
    pub fn new(
        id: AgentId,
        parent: AgentId,
        task: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            short_name: id.short_name().to_string(),
            id,
            parent,
            task: task.into(),
            created_at: Utc::now(),
            timeout,
            state: Mutex::new(RecordState {
                status: SubAgentStatus::Pending,
                result: None,
                error: None,
            }),
            done,
            cancel: CancellationToken::new(),
        }
    }

    pub fn status(&self) -> SubAgentStatus {
        self.state.lock().status
    }

    pub fn result(&self) -> Option<String> {
        self.state.lock().result.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    /// `pending -> running`; false if the record already moved on
    pub fn mark_running(&self) -> bool {
        let mut state = self.state.lock();
        if state.status != SubAgentStatus::Pending {
            return false;
        }
        state.status = SubAgentStatus::Running;
        true
    }

    /// Move to a terminal status; false (and no change) if already terminal
    pub fn finish(&self, status: SubAgentStatus, text: Option<String>) -> bool {
        debug_assert!(status.is_terminal());
        let mut state = self.state.lock();
        if state.status.is_terminal() {
            return false;
        }
        state.status = status;
        match status {
            SubAgentStatus::Error => state.error = text,
            _ => state.result = text,
        }
        true
    }

    /// Fire the completion signal; only the first call has any effect
    pub fn signal_done(&self) -> bool {
        self.done.send_if_modified(|done| {
            if *done {
                false
            } else {
                *done = true;
                true
            }
        })
    }

    pub fn is_done(&self) -> bool {
        *self.done.borrow()
    }

    /// Receiver for the completion signal
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.done.subscribe()
    }

    /// Wait for completion; false on timeout
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.done.subscribe();
        let waited = tokio::time::timeout(timeout, rx.wait_for(|done| *done)).await;
        matches!(waited, Ok(Ok(_)))
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn info(&self) -> SubAgentInfo {
        let state = self.state.lock();
        SubAgentInfo {
            id: self.id.clone(),
            parent: self.parent.clone(),
            short_name: self.short_name.clone(),
            task: self.task.clone(),
            status: state.status,
            result: state.result.clone(),
            error: state.error.clone(),
            created_at: self.created_at,
        }
    }
}
