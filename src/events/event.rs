//! # Scheduler events consumed by the dispatcher.
//!
//! [`SchedulerEvent`] is a closed sum type over the six event kinds the core
//! understands. Handlers `match` on it exhaustively, so adding a kind is a
//! compile-time change everywhere it matters.
//!
//! | Kind               | Key           | Produced by                               |
//! |--------------------|---------------|-------------------------------------------|
//! | `NodeAdded`        | node          | node registration                         |
//! | `NodeRemoved`      | node          | administrator, heartbeat monitor (`Lost`) |
//! | `NodeUpdate`       | node          | heartbeat transport                       |
//! | `AppAdded`         | application   | submission handler                        |
//! | `AppRemoved`       | application   | client / application master               |
//! | `ContainerExpired` | container     | allocation expirer                        |
//!
//! ## Example
//! ```rust
//! use rmvisor::{EventKind, EventKey, NodeId, SchedulerEvent};
//!
//! let ev = SchedulerEvent::node_added("node-1");
//! assert_eq!(ev.kind(), EventKind::NodeAdded);
//! assert_eq!(ev.key(), EventKey::Node(&NodeId::from("node-1")));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use crate::model::{AppId, ContainerId, Epoch, NodeId, NodeStatusEvent};

/// Fieldless discriminant of [`SchedulerEvent`], used as the registration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    NodeAdded,
    NodeRemoved,
    NodeUpdate,
    AppAdded,
    AppRemoved,
    ContainerExpired,
}

impl EventKind {
    /// All kinds, in declaration order.
    pub const ALL: [EventKind; 6] = [
        EventKind::NodeAdded,
        EventKind::NodeRemoved,
        EventKind::NodeUpdate,
        EventKind::AppAdded,
        EventKind::AppRemoved,
        EventKind::ContainerExpired,
    ];

    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::NodeAdded => "node_added",
            EventKind::NodeRemoved => "node_removed",
            EventKind::NodeUpdate => "node_update",
            EventKind::AppAdded => "app_added",
            EventKind::AppRemoved => "app_removed",
            EventKind::ContainerExpired => "container_expired",
        }
    }
}

/// Why a node left the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// Administrative removal.
    Decommissioned,
    /// Heartbeat deadline elapsed for the registration armed at `epoch`.
    Lost { epoch: Epoch },
}

/// Terminal state requested for a removed application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinalState {
    Finished,
    Failed,
    #[default]
    Killed,
}

/// The single identifying key every event carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKey<'a> {
    Node(&'a NodeId),
    App(&'a AppId),
    Container(&'a ContainerId),
}

impl fmt::Display for EventKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKey::Node(id) => write!(f, "node={id}"),
            EventKey::App(id) => write!(f, "app={id}"),
            EventKey::Container(id) => write!(f, "container={id}"),
        }
    }
}

/// Event routed through the [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    NodeAdded {
        node: NodeId,
    },
    NodeRemoved {
        node: NodeId,
        cause: RemovalCause,
    },
    /// Heartbeat report. The key is the reporting node (`status.node_id()`).
    NodeUpdate {
        status: Arc<NodeStatusEvent>,
    },
    AppAdded {
        app: AppId,
    },
    AppRemoved {
        app: AppId,
        final_state: FinalState,
    },
    /// Allocation deadline elapsed for the allocation armed at `epoch`.
    ContainerExpired {
        container: ContainerId,
        epoch: Epoch,
    },
}

impl SchedulerEvent {
    pub fn node_added(node: impl Into<NodeId>) -> Self {
        SchedulerEvent::NodeAdded { node: node.into() }
    }

    /// Administrative removal (`Decommissioned`).
    pub fn node_removed(node: impl Into<NodeId>) -> Self {
        SchedulerEvent::NodeRemoved {
            node: node.into(),
            cause: RemovalCause::Decommissioned,
        }
    }

    pub fn node_lost(node: impl Into<NodeId>, epoch: Epoch) -> Self {
        SchedulerEvent::NodeRemoved {
            node: node.into(),
            cause: RemovalCause::Lost { epoch },
        }
    }

    pub fn node_update(status: NodeStatusEvent) -> Self {
        SchedulerEvent::NodeUpdate {
            status: Arc::new(status),
        }
    }

    pub fn app_added(app: impl Into<AppId>) -> Self {
        SchedulerEvent::AppAdded { app: app.into() }
    }

    pub fn app_removed(app: impl Into<AppId>, final_state: FinalState) -> Self {
        SchedulerEvent::AppRemoved {
            app: app.into(),
            final_state,
        }
    }

    pub fn container_expired(container: impl Into<ContainerId>, epoch: Epoch) -> Self {
        SchedulerEvent::ContainerExpired {
            container: container.into(),
            epoch,
        }
    }

    #[inline]
    pub fn kind(&self) -> EventKind {
        match self {
            SchedulerEvent::NodeAdded { .. } => EventKind::NodeAdded,
            SchedulerEvent::NodeRemoved { .. } => EventKind::NodeRemoved,
            SchedulerEvent::NodeUpdate { .. } => EventKind::NodeUpdate,
            SchedulerEvent::AppAdded { .. } => EventKind::AppAdded,
            SchedulerEvent::AppRemoved { .. } => EventKind::AppRemoved,
            SchedulerEvent::ContainerExpired { .. } => EventKind::ContainerExpired,
        }
    }

    #[inline]
    pub fn key(&self) -> EventKey<'_> {
        match self {
            SchedulerEvent::NodeAdded { node } | SchedulerEvent::NodeRemoved { node, .. } => {
                EventKey::Node(node)
            }
            SchedulerEvent::NodeUpdate { status } => EventKey::Node(status.node_id()),
            SchedulerEvent::AppAdded { app } | SchedulerEvent::AppRemoved { app, .. } => {
                EventKey::App(app)
            }
            SchedulerEvent::ContainerExpired { container, .. } => EventKey::Container(container),
        }
    }
}

/// A dequeued event together with its dispatch metadata.
///
/// `seq` is assigned by the dispatch loop in dequeue order, which is submission order.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub seq: u64,
    pub at: SystemTime,
    pub event: SchedulerEvent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NodeHealthStatus, ResponseId};
    use std::collections::BTreeMap;

    #[test]
    fn test_every_event_has_its_key() {
        let status = NodeStatusEvent::new(
            NodeId::from("n1"),
            NodeHealthStatus::healthy(),
            BTreeMap::new(),
            ResponseId(1),
        );
        let cases = [
            (SchedulerEvent::node_added("n1"), "node=n1"),
            (SchedulerEvent::node_removed("n1"), "node=n1"),
            (SchedulerEvent::node_lost("n1", Epoch(1)), "node=n1"),
            (SchedulerEvent::node_update(status), "node=n1"),
            (SchedulerEvent::app_added("a1"), "app=a1"),
            (SchedulerEvent::app_removed("a1", FinalState::Finished), "app=a1"),
            (SchedulerEvent::container_expired("c1", Epoch(2)), "container=c1"),
        ];
        for (ev, key) in cases {
            assert_eq!(ev.key().to_string(), key, "{:?}", ev.kind());
        }
    }

    #[test]
    fn test_kind_labels_are_unique() {
        let mut labels: Vec<&str> = EventKind::ALL.iter().map(EventKind::as_label).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), EventKind::ALL.len());
    }
}
