//! Node and event types shared by the classifier, reconciler and monitor.

use std::fmt;

/// PipeWire global id. Unique within one `pw-dump` session only.
pub type NodeId = u32;

pub const UNKNOWN_APP_NAME: &str = "Unknown";

/// Lifecycle state reported in a node's `info.state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Running,
    Idle,
    Suspended,
    Paused,
    Other,
}

impl NodeState {
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("running") => Self::Running,
            Some("idle") => Self::Idle,
            Some("suspended") => Self::Suspended,
            Some("paused") => Self::Paused,
            _ => Self::Other,
        }
    }

    /// States that end playback for a stream that was running.
    pub fn is_quiescent(self) -> bool {
        matches!(self, Self::Idle | Self::Suspended | Self::Paused)
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::Idle => "idle",
            Self::Suspended => "suspended",
            Self::Paused => "paused",
            Self::Other => "other",
        };
        f.write_str(label)
    }
}

/// An audio output stream or sink node from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevantNode {
    pub id: NodeId,
    pub app_name: String,
    pub state: NodeState,
}

impl RelevantNode {
    pub fn new(id: NodeId, app_name: impl Into<String>, state: NodeState) -> Self {
        Self {
            id,
            app_name: app_name.into(),
            state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// The node reported idle, suspended or paused.
    StateChange,
    /// The node disappeared from the graph while still playing.
    Vanished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Started {
        node_id: NodeId,
        app_name: String,
    },
    Stopped {
        node_id: NodeId,
        app_name: String,
        cause: StopCause,
    },
}

impl StreamEvent {
    pub fn node_id(&self) -> NodeId {
        match self {
            Self::Started { node_id, .. } | Self::Stopped { node_id, .. } => *node_id,
        }
    }

    pub fn app_name(&self) -> &str {
        match self {
            Self::Started { app_name, .. } | Self::Stopped { app_name, .. } => app_name,
        }
    }
}
