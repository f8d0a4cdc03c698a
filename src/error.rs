//! Error types used by the resource manager core.
//!
//! - [`TrackerError`]: an event or call the node/application trackers refused.
//! - [`DispatchError`]: misuse of the dispatcher (registration, closed loop).
//! - [`HandlerError`]: returned by [`Handler`](crate::Handler) implementations.
//! - [`PoolError`]: the resource pool could not satisfy a debit.
//! - [`RuntimeError`]: the manager itself failed to start or stop cleanly.
//!
//! Every enum provides `as_label` (stable snake_case, used as counter key and log field).

use std::time::Duration;
use thiserror::Error;

use crate::events::EventKind;
use crate::model::{AppId, ContainerId, Epoch, NodeId, Resource, ResponseId};
use crate::{apps::AppState, nodes::NodeState};

/// # Errors raised by the node and application trackers.
///
/// None of these are fatal. When they arise while handling an event they are logged,
/// counted and the event is dropped; the dispatch loop never sees them.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    /// `NodeAdded` for a node that is already tracked and not terminal.
    #[error("node {node} already registered in state {state:?}")]
    DuplicateNode { node: NodeId, state: NodeState },

    /// Event or call referencing a node that was never added.
    #[error("unknown node {node}")]
    UnknownNode { node: NodeId },

    /// Update or removal for a node that is already lost or decommissioned.
    #[error("node {node} is inactive ({state:?})")]
    InactiveNode { node: NodeId, state: NodeState },

    /// Heartbeat whose token is not newer than the last processed one.
    #[error("stale heartbeat from {node}: token {token} <= last {last}")]
    StaleHeartbeat {
        node: NodeId,
        token: ResponseId,
        last: ResponseId,
    },

    /// Expiry that lost the race against a release through another path.
    #[error("stale expiry for {key} at {epoch}")]
    ExpiryRace { key: String, epoch: Epoch },

    /// `AppAdded` for an application that is already tracked and not terminal.
    #[error("application {app} already registered in state {state:?}")]
    DuplicateApp { app: AppId, state: AppState },

    #[error("unknown application {app}")]
    UnknownApp { app: AppId },

    /// Operation on an application that already reached a terminal state.
    #[error("application {app} is inactive ({state:?})")]
    InactiveApp { app: AppId, state: AppState },

    /// Requested application state change is not allowed from its current state.
    #[error("application {app}: cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        app: AppId,
        from: AppState,
        to: AppState,
    },

    #[error("container {container} already allocated")]
    DuplicateContainer { container: ContainerId },

    #[error("unknown container {container}")]
    UnknownContainer { container: ContainerId },

    /// A node reported a container that is allocated on another node or to another app.
    #[error("container {container} reported by {node} but placed on {owner}")]
    MisplacedContainer {
        container: ContainerId,
        node: NodeId,
        owner: NodeId,
    },

    /// Allocation request larger than the configured maximum capability.
    #[error("resource {requested} exceeds maximum capability {max}")]
    InvalidResource { requested: Resource, max: Resource },

    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl TrackerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use rmvisor::{NodeId, TrackerError};
    ///
    /// let err = TrackerError::UnknownNode { node: NodeId::from("n1") };
    /// assert_eq!(err.as_label(), "unknown_node");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TrackerError::DuplicateNode { .. } => "duplicate_node",
            TrackerError::UnknownNode { .. } => "unknown_node",
            TrackerError::InactiveNode { .. } => "inactive_node",
            TrackerError::StaleHeartbeat { .. } => "stale_heartbeat",
            TrackerError::ExpiryRace { .. } => "expiry_race",
            TrackerError::DuplicateApp { .. } => "duplicate_app",
            TrackerError::UnknownApp { .. } => "unknown_app",
            TrackerError::InactiveApp { .. } => "inactive_app",
            TrackerError::InvalidTransition { .. } => "invalid_transition",
            TrackerError::DuplicateContainer { .. } => "duplicate_container",
            TrackerError::UnknownContainer { .. } => "unknown_container",
            TrackerError::MisplacedContainer { .. } => "misplaced_container",
            TrackerError::InvalidResource { .. } => "invalid_resource",
            TrackerError::Pool(e) => e.as_label(),
        }
    }

    /// Whether this rejection is routine (network retransmission, timer race)
    /// rather than a sign of a misbehaving producer.
    ///
    /// Expected rejections are logged at `debug`, the rest at `warn`.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            TrackerError::StaleHeartbeat { .. } | TrackerError::ExpiryRace { .. }
        )
    }
}

/// # Errors of the resource pool.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("insufficient resources: requested {requested}, available {available}")]
    Insufficient {
        requested: Resource,
        available: Resource,
    },
}

impl PoolError {
    pub fn as_label(&self) -> &'static str {
        match self {
            PoolError::Insufficient { .. } => "pool_insufficient",
        }
    }
}

/// # Errors produced by the dispatcher.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The same handler instance was registered twice for one event kind.
    #[error("handler {handler} already registered for {kind:?}")]
    DuplicateHandler {
        kind: EventKind,
        handler: &'static str,
    },

    /// The dispatch loop has stopped; the event was not enqueued.
    #[error("dispatcher closed")]
    Closed,

    /// `run` was called on a dispatcher whose loop was already started.
    #[error("dispatcher already running")]
    AlreadyRunning,
}

impl DispatchError {
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::DuplicateHandler { .. } => "dispatch_duplicate_handler",
            DispatchError::Closed => "dispatch_closed",
            DispatchError::AlreadyRunning => "dispatch_already_running",
        }
    }
}

/// # Errors returned by event handlers.
///
/// The dispatcher logs them and keeps delivering to the remaining handlers.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("handler failed: {error}")]
    Failed { error: String },

    /// A tracker call made by the handler (e.g. a scheduler allocating) was refused.
    ///
    /// Lets handlers use `?` on tracker operations; the dispatcher also counts the
    /// tracker's own label.
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

impl HandlerError {
    pub fn as_label(&self) -> &'static str {
        match self {
            HandlerError::Failed { .. } => "handler_failed",
            HandlerError::Tracker(e) => e.as_label(),
        }
    }
}

/// # Errors produced by the resource manager runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Workers did not stop within the configured grace period.
    #[error("shutdown timeout {grace:?} exceeded; forcing termination")]
    GraceExceeded { grace: Duration },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use rmvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5) };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Dispatch(e) => e.as_label(),
        }
    }
}
