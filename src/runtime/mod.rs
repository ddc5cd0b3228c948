//! Sub-agent runtime
//!
//! - `AgentRegistry` - shared map of live agents and their providers
//! - `SubAgentSupervisor` - spawns, budgets, cancels and cleans up sub-agents
//! - `EventSink` - broadcast of provider events tagged with their agent id
//!
//! Children run as tokio tasks. Their events are forwarded to the sink as
//! they arrive, and their provider is released when they reach a terminal
//! status.

pub mod channels;
pub mod record;
pub mod registry;
pub mod supervisor;

pub use channels::{AgentEvent, EventReceiver, EventSink, EVENT_CHANNEL_SIZE};
pub use record::{SubAgentInfo, SubAgentRecord, SubAgentStatus};
pub use registry::AgentRegistry;
pub use supervisor::{
    child_system_prompt, CancelOutcome, SpawnOutcome, SubAgentSupervisor, SupervisorLimits,
};
