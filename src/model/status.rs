//! # Node heartbeat payload.
//!
//! [`NodeStatusEvent`] is what one heartbeat from one node turns into once the
//! transport has decoded it. It is immutable: the node tracker derives what changed
//! by comparing it against stored node state, never by editing the event.
//!
//! ## Shape
//! ```text
//! NodeStatusEvent
//!   ├─ node_id          (who reported)
//!   ├─ health           (NodeHealthStatus)
//!   ├─ containers       (AppId → [ContainerStatus], report order per app)
//!   └─ latest_response  (ack token last sent to the node)
//! ```

use std::collections::BTreeMap;

use super::{AppId, ContainerId, NodeHealthStatus, NodeId, ResponseId};

/// Execution state of a container as seen by its node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContainerState {
    /// Container process is running.
    Running,
    /// Container has exited since the previous heartbeat.
    Complete,
}

/// One container entry of a heartbeat report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerStatus {
    pub container_id: ContainerId,
    pub state: ContainerState,
    /// Exit code, set only for completed containers.
    pub exit_status: Option<i32>,
}

impl ContainerStatus {
    pub fn running(container_id: impl Into<ContainerId>) -> Self {
        Self {
            container_id: container_id.into(),
            state: ContainerState::Running,
            exit_status: None,
        }
    }

    pub fn complete(container_id: impl Into<ContainerId>, exit_status: i32) -> Self {
        Self {
            container_id: container_id.into(),
            state: ContainerState::Complete,
            exit_status: Some(exit_status),
        }
    }
}

/// Heartbeat report of a single node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeStatusEvent {
    node_id: NodeId,
    health: NodeHealthStatus,
    containers: BTreeMap<AppId, Vec<ContainerStatus>>,
    latest_response: ResponseId,
}

impl NodeStatusEvent {
    pub fn new(
        node_id: NodeId,
        health: NodeHealthStatus,
        containers: BTreeMap<AppId, Vec<ContainerStatus>>,
        latest_response: ResponseId,
    ) -> Self {
        Self {
            node_id,
            health,
            containers,
            latest_response,
        }
    }

    #[inline]
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    #[inline]
    pub fn health(&self) -> &NodeHealthStatus {
        &self.health
    }

    /// Containers reported per application.
    #[inline]
    pub fn containers(&self) -> &BTreeMap<AppId, Vec<ContainerStatus>> {
        &self.containers
    }

    #[inline]
    pub fn latest_response(&self) -> ResponseId {
        self.latest_response
    }

    /// Iterates all reported containers with their owning application.
    pub fn statuses(&self) -> impl Iterator<Item = (&AppId, &ContainerStatus)> {
        self.containers
            .iter()
            .flat_map(|(app, list)| list.iter().map(move |c| (app, c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statuses_flatten_in_report_order() {
        let mut containers = BTreeMap::new();
        containers.insert(
            AppId::from("app-1"),
            vec![ContainerStatus::running("c2"), ContainerStatus::running("c1")],
        );
        containers.insert(AppId::from("app-2"), vec![ContainerStatus::complete("c9", 0)]);

        let ev = NodeStatusEvent::new(
            NodeId::from("node-1"),
            NodeHealthStatus::healthy(),
            containers,
            ResponseId(1),
        );

        let flat: Vec<(&str, &str)> = ev
            .statuses()
            .map(|(a, c)| (a.as_str(), c.container_id.as_str()))
            .collect();
        assert_eq!(flat, vec![("app-1", "c2"), ("app-1", "c1"), ("app-2", "c9")]);
    }
}
