use std::time::Duration;

use tokio::sync::broadcast;

/// Capacity of the per-node and per-pool event channels.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle notification emitted by a [`Node`](crate::node::Node) for every call.
///
/// Every `QueryStarted` is followed by exactly one of the other variants
/// carrying the same `endpoint` and `id`.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    QueryStarted {
        endpoint: String,
        method: String,
        id: u64,
    },
    QuerySucceeded {
        endpoint: String,
        method: String,
        id: u64,
        latency: Duration,
        block_height: Option<u64>,
        user_agent: Option<String>,
    },
    QueryFailed {
        endpoint: String,
        method: String,
        id: u64,
        error: String,
    },
    /// The caller dropped the call before the transport resolved.
    QueryCancelled {
        endpoint: String,
        method: String,
        id: u64,
    },
}

impl NodeEvent {
    pub fn endpoint(&self) -> &str {
        match self {
            NodeEvent::QueryStarted { endpoint, .. }
            | NodeEvent::QuerySucceeded { endpoint, .. }
            | NodeEvent::QueryFailed { endpoint, .. }
            | NodeEvent::QueryCancelled { endpoint, .. } => endpoint,
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            NodeEvent::QueryStarted { id, .. }
            | NodeEvent::QuerySucceeded { id, .. }
            | NodeEvent::QueryFailed { id, .. }
            | NodeEvent::QueryCancelled { id, .. } => *id,
        }
    }

    /// Whether this event closes a call.
    pub fn is_completion(&self) -> bool {
        !matches!(self, NodeEvent::QueryStarted { .. })
    }
}

/// Broadcast sender that receives the events of one or more nodes.
pub type EventSink = broadcast::Sender<NodeEvent>;

/// Creates a sink with the default capacity.
pub fn event_channel() -> EventSink {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}
