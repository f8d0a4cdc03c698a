//! # Node tracker: per-node state driven by heartbeats.
//!
//! ## Event handling
//! ```text
//! Dispatcher ──► NodeTracker::handle()
//!   ├─► NodeAdded(node)        → add_node: New, arm heartbeat monitor
//!   ├─► NodeUpdate(status)     → apply_status → NodeDelta → Reconcile::containers_changed
//!   └─► NodeRemoved(node,cause)→ remove_node: Lost | Decommissioned → Reconcile::node_removed
//! ```
//!
//! ## Rules
//! - The heartbeat report is authoritative: the running container set is replaced, not merged.
//! - A heartbeat is accepted only if its token is strictly newer than the last accepted one,
//!   so a replayed report leaves the tracker untouched.
//! - `Lost` carries the epoch of the monitor registration that expired; a mismatch means the
//!   node was removed or re-added in between and the expiry is dropped.
//! - Rejected events are logged, counted and published as `EventRejected`; `handle` never fails.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::state::{NodeReport, NodeState};
use crate::counters::Counters;
use crate::dispatch::{Handler, report_rejection};
use crate::error::{HandlerError, TrackerError};
use crate::events::{Bus, Envelope, Notice, NoticeKind, RemovalCause, SchedulerEvent};
use crate::model::{
    AppId, ContainerId, ContainerState, Epoch, NodeHealthStatus, NodeId, NodeStatusEvent,
    ResponseId,
};
use crate::monitor::LivelinessMonitor;

/// Container-level changes derived from one accepted heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeDelta {
    /// Reported running now, not running in the previous report.
    pub newly_present: Vec<(AppId, ContainerId)>,
    /// Running in the previous report, missing now (and not reported complete).
    pub newly_absent: Vec<(AppId, ContainerId)>,
    /// Reported complete in this heartbeat.
    pub completed: Vec<(AppId, ContainerId)>,
}

impl NodeDelta {
    pub fn is_empty(&self) -> bool {
        self.newly_present.is_empty() && self.newly_absent.is_empty() && self.completed.is_empty()
    }
}

/// Receiver of container-level consequences of node events.
///
/// Implemented by the application tracker so application state follows node reports.
#[async_trait]
pub trait Reconcile: Send + Sync + 'static {
    /// Called after an accepted heartbeat.
    async fn containers_changed(&self, node: &NodeId, delta: &NodeDelta);

    /// Called after a node became lost or decommissioned.
    async fn node_removed(&self, node: &NodeId, cause: RemovalCause);
}

struct NodeRecord {
    state: NodeState,
    epoch: Epoch,
    health: Option<NodeHealthStatus>,
    last_response: Option<ResponseId>,
    last_heartbeat: Option<SystemTime>,
    /// Running container → owning application.
    containers: BTreeMap<ContainerId, AppId>,
    heartbeats: u64,
    completed: u64,
}

impl NodeRecord {
    fn new(epoch: Epoch) -> Self {
        Self {
            state: NodeState::New,
            epoch,
            health: None,
            last_response: None,
            last_heartbeat: None,
            containers: BTreeMap::new(),
            heartbeats: 0,
            completed: 0,
        }
    }

    fn report(&self, node: &NodeId) -> NodeReport {
        NodeReport {
            node: node.clone(),
            state: self.state,
            epoch: self.epoch,
            health: self.health.clone(),
            last_response: self.last_response,
            last_heartbeat: self.last_heartbeat,
            containers: self.containers.keys().cloned().collect(),
            heartbeats: self.heartbeats,
            completed_containers: self.completed,
        }
    }
}

/// Tracks every node known to the resource manager.
pub struct NodeTracker {
    nodes: RwLock<HashMap<NodeId, NodeRecord>>,
    liveness: Arc<LivelinessMonitor<NodeId>>,
    reconcile: Arc<dyn Reconcile>,
    bus: Bus,
    counters: Arc<Counters>,
}

impl NodeTracker {
    pub fn new(
        liveness: Arc<LivelinessMonitor<NodeId>>,
        reconcile: Arc<dyn Reconcile>,
        bus: Bus,
        counters: Arc<Counters>,
    ) -> Arc<Self> {
        Arc::new(Self {
            nodes: RwLock::new(HashMap::new()),
            liveness,
            reconcile,
            bus,
            counters,
        })
    }

    /// Registers a node in `New` with zeroed counters.
    ///
    /// A terminal record for the same id is replaced; a live one is a `DuplicateNode`.
    pub async fn add_node(&self, node: &NodeId) -> Result<Epoch, TrackerError> {
        let mut nodes = self.nodes.write().await;
        if let Some(existing) = nodes.get(node) {
            if !existing.state.is_terminal() {
                return Err(TrackerError::DuplicateNode {
                    node: node.clone(),
                    state: existing.state,
                });
            }
        }
        let epoch = self.liveness.register(node.clone());
        nodes.insert(node.clone(), NodeRecord::new(epoch));
        drop(nodes);

        info!(%node, %epoch, "node added");
        self.bus
            .publish(Notice::new(NoticeKind::NodeRegistered).with_node(node.clone()));
        Ok(epoch)
    }

    /// Applies one heartbeat report and returns the container changes it implies.
    ///
    /// The stored container set is replaced by the containers reported running.
    pub async fn apply_status(&self, status: &NodeStatusEvent) -> Result<NodeDelta, TrackerError> {
        let node = status.node_id();
        let token = status.latest_response();

        let mut nodes = self.nodes.write().await;
        let rec = nodes
            .get_mut(node)
            .ok_or_else(|| TrackerError::UnknownNode { node: node.clone() })?;

        if rec.state.is_terminal() {
            return Err(TrackerError::InactiveNode {
                node: node.clone(),
                state: rec.state,
            });
        }
        if let Some(last) = rec.last_response {
            if token <= last {
                return Err(TrackerError::StaleHeartbeat {
                    node: node.clone(),
                    token,
                    last,
                });
            }
        }

        self.liveness.ping(node);
        rec.last_response = Some(token);
        rec.last_heartbeat = Some(SystemTime::now());
        rec.heartbeats += 1;

        // Complete wins over Running when one report lists a container as both.
        let finished: BTreeSet<&ContainerId> = status
            .statuses()
            .filter(|(_, c)| c.state == ContainerState::Complete)
            .map(|(_, c)| &c.container_id)
            .collect();

        let mut running: BTreeMap<ContainerId, AppId> = BTreeMap::new();
        let mut delta = NodeDelta::default();
        for (app, c) in status.statuses() {
            match c.state {
                ContainerState::Running if finished.contains(&c.container_id) => {}
                ContainerState::Running => {
                    if !rec.containers.contains_key(&c.container_id) {
                        delta
                            .newly_present
                            .push((app.clone(), c.container_id.clone()));
                    }
                    running.insert(c.container_id.clone(), app.clone());
                }
                ContainerState::Complete => {
                    delta.completed.push((app.clone(), c.container_id.clone()));
                }
            }
        }
        for (container, app) in &rec.containers {
            if !running.contains_key(container) && !finished.contains(container) {
                delta.newly_absent.push((app.clone(), container.clone()));
            }
        }
        rec.completed += delta.completed.len() as u64;
        rec.containers = running;

        let health = status.health().clone();
        let prev = rec.state;
        let next = prev.on_heartbeat(health.is_healthy());
        rec.state = next;
        rec.health = Some(health.clone());
        drop(nodes);

        debug!(
            %node,
            %token,
            present = delta.newly_present.len(),
            absent = delta.newly_absent.len(),
            completed = delta.completed.len(),
            "heartbeat applied"
        );
        if next != prev {
            info!(%node, from = ?prev, to = ?next, "node state changed");
            let notice = match next {
                NodeState::Unhealthy => {
                    let n = Notice::new(NoticeKind::NodeUnhealthy).with_node(node.clone());
                    match health.report() {
                        Some(report) => n.with_reason(report),
                        None => n,
                    }
                }
                _ => Notice::new(NoticeKind::NodeRunning).with_node(node.clone()),
            };
            self.bus.publish(notice);
        }
        Ok(delta)
    }

    /// Moves a node to `Lost` or `Decommissioned` and releases its containers.
    ///
    /// Returns the containers the node last reported as running.
    pub async fn remove_node(
        &self,
        node: &NodeId,
        cause: RemovalCause,
    ) -> Result<Vec<ContainerId>, TrackerError> {
        let mut nodes = self.nodes.write().await;
        let rec = nodes
            .get_mut(node)
            .ok_or_else(|| TrackerError::UnknownNode { node: node.clone() })?;

        let next = match cause {
            RemovalCause::Lost { epoch } => {
                if rec.state.is_terminal() || rec.epoch != epoch {
                    return Err(TrackerError::ExpiryRace {
                        key: node.to_string(),
                        epoch,
                    });
                }
                NodeState::Lost
            }
            RemovalCause::Decommissioned => {
                if rec.state.is_terminal() {
                    return Err(TrackerError::InactiveNode {
                        node: node.clone(),
                        state: rec.state,
                    });
                }
                NodeState::Decommissioned
            }
        };

        let prev = rec.state;
        rec.state = next;
        let released: Vec<ContainerId> = std::mem::take(&mut rec.containers).into_keys().collect();
        self.liveness.unregister(node);
        drop(nodes);

        info!(%node, from = ?prev, to = ?next, containers = released.len(), "node removed");
        let kind = match next {
            NodeState::Lost => NoticeKind::NodeLost,
            _ => NoticeKind::NodeDecommissioned,
        };
        self.bus.publish(Notice::new(kind).with_node(node.clone()));

        self.reconcile.node_removed(node, cause).await;
        Ok(released)
    }

    pub async fn state(&self, node: &NodeId) -> Option<NodeState> {
        self.nodes.read().await.get(node).map(|r| r.state)
    }

    pub async fn report(&self, node: &NodeId) -> Option<NodeReport> {
        self.nodes.read().await.get(node).map(|r| r.report(node))
    }

    /// Containers the node last reported as running, sorted.
    pub async fn containers(&self, node: &NodeId) -> Vec<ContainerId> {
        self.nodes
            .read()
            .await
            .get(node)
            .map(|r| r.containers.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Sorted ids of nodes the scheduler may place containers on.
    pub async fn schedulable(&self) -> Vec<NodeId> {
        let nodes = self.nodes.read().await;
        let mut ids: Vec<NodeId> = nodes
            .iter()
            .filter(|(_, r)| r.state.is_schedulable())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of tracked nodes, terminal ones included.
    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.nodes.read().await.is_empty()
    }

    async fn ingest(&self, status: &NodeStatusEvent) -> Result<(), TrackerError> {
        let delta = self.apply_status(status).await?;
        if !delta.is_empty() {
            self.reconcile
                .containers_changed(status.node_id(), &delta)
                .await;
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for NodeTracker {
    async fn handle(&self, env: &Envelope) -> Result<(), HandlerError> {
        let outcome = match &env.event {
            SchedulerEvent::NodeAdded { node } => self.add_node(node).await.map(|_| ()),
            SchedulerEvent::NodeUpdate { status } => self.ingest(status).await,
            SchedulerEvent::NodeRemoved { node, cause } => {
                self.remove_node(node, *cause).await.map(|_| ())
            }
            SchedulerEvent::AppAdded { .. }
            | SchedulerEvent::AppRemoved { .. }
            | SchedulerEvent::ContainerExpired { .. } => Ok(()),
        };
        if let Err(err) = outcome {
            report_rejection(&self.bus, &self.counters, self.name(), env, &err);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "node-tracker"
    }
}
