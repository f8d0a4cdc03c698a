use std::time::SystemTime;

use crate::model::{ContainerId, Epoch, NodeHealthStatus, NodeId, ResponseId};

/// Lifecycle state of a tracked node.
///
/// ```text
/// (absent) ──NodeAdded──► New ──healthy──► Running ◄──healthy── Unhealthy
///                          │                  │ ──unhealthy──►     ▲
///                          └──────unhealthy───┴────────────────────┘
/// any non-terminal ──heartbeat timeout──► Lost
/// any non-terminal ──NodeRemoved────────► Decommissioned
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    New,
    Running,
    Unhealthy,
    Lost,
    Decommissioned,
}

impl NodeState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Lost | NodeState::Decommissioned)
    }

    /// Only running nodes are offered to the scheduler.
    #[inline]
    pub fn is_schedulable(&self) -> bool {
        matches!(self, NodeState::Running)
    }

    /// State after a heartbeat with the given health, for a non-terminal node.
    pub(crate) fn on_heartbeat(self, healthy: bool) -> NodeState {
        match (self, healthy) {
            (NodeState::New | NodeState::Unhealthy, true) => NodeState::Running,
            (NodeState::New | NodeState::Running, false) => NodeState::Unhealthy,
            (state, _) => state,
        }
    }
}

/// Point-in-time view of one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub node: NodeId,
    pub state: NodeState,
    /// Heartbeat monitor registration this record belongs to.
    pub epoch: Epoch,
    pub health: Option<NodeHealthStatus>,
    pub last_response: Option<ResponseId>,
    pub last_heartbeat: Option<SystemTime>,
    /// Containers the node last reported as running, sorted.
    pub containers: Vec<ContainerId>,
    /// Accepted heartbeats since registration.
    pub heartbeats: u64,
    /// Containers reported complete since registration.
    pub completed_containers: u64,
}
