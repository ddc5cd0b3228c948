//! Event fan-out for agents and sub-agents
//!
//! Every event a sub-agent's provider emits is re-published on one broadcast
//! channel, tagged with the emitting agent's id, so front-ends observe nested
//! activity through the same sink as top-level agents.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::core::{AgentId, NormalizedEvent};

/// Default buffer size for the event broadcast channel
pub const EVENT_CHANNEL_SIZE: usize = 256;

/// A provider event tagged with the agent that produced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentEvent {
    pub agent_id: AgentId,
    #[serde(flatten)]
    pub event: NormalizedEvent,
}

/// Receiver half (one per subscriber)
pub type EventReceiver = broadcast::Receiver<AgentEvent>;

/// Multi-consumer sink for tagged agent events
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_CHANNEL_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    /// Publish one event; dropped silently when nobody listens
    pub fn emit(&self, agent_id: AgentId, event: NormalizedEvent) {
        let _ = self.tx.send(AgentEvent { agent_id, event });
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_are_tagged() {
        let sink = EventSink::new();
        let mut rx = sink.subscribe();
        let id = AgentId::default().child("fetcher");

        sink.emit(id.clone(), NormalizedEvent::text("hi"));

        let received = rx.recv().await.unwrap();
        assert_eq!(received.agent_id, id);
        assert_eq!(received.event, NormalizedEvent::text("hi"));

        let value = serde_json::to_value(&received).unwrap();
        assert_eq!(value["agent_id"], "main/fetcher");
        assert_eq!(value["type"], "assistant_text");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let sink = EventSink::new();
        sink.emit(AgentId::default(), NormalizedEvent::status("nobody listening"));
        assert_eq!(sink.receiver_count(), 0);
    }
}
