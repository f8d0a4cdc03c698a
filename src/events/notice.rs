//! # Monitoring notices.
//!
//! A [`Notice`] reports something that already happened inside the core
//! (a node changed state, a container expired, a handler failed). Notices are
//! published on the [`Bus`](super::Bus) and fanned out to subscribers; nothing
//! in the core reacts to them, they exist for logs, metrics and alerting.
//!
//! The [`NoticeKind`] enum groups into:
//! - **Node** transitions: registered, running, unhealthy, lost, decommissioned
//! - **Application / container** lifecycle: submitted, finished, allocated, launched,
//!   released, expired
//! - **Rejections and faults**: event rejected, handler failed/panicked, subscriber
//!   overflow/panic
//!
//! ## Example
//! ```rust
//! use rmvisor::{Notice, NoticeKind};
//!
//! let n = Notice::new(NoticeKind::ContainerExpired)
//!     .with_app("app-2")
//!     .with_container("c9");
//! assert_eq!(n.container.as_ref().map(|c| c.as_str()), Some("c9"));
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use crate::model::{AppId, ContainerId, NodeId, Resource};

/// Classification of monitoring notices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    // === Nodes ===
    /// Node entered `New`.
    ///
    /// Sets: `node`
    NodeRegistered,
    /// Node entered `Running`.
    ///
    /// Sets: `node`
    NodeRunning,
    /// Node entered `Unhealthy`.
    ///
    /// Sets: `node`, `reason` (health report, if any)
    NodeUnhealthy,
    /// Heartbeat deadline elapsed; node entered `Lost`.
    ///
    /// Sets: `node`
    NodeLost,
    /// Node administratively removed.
    ///
    /// Sets: `node`
    NodeDecommissioned,

    // === Applications ===
    /// Application entered `Submitted`.
    ///
    /// Sets: `app`
    AppSubmitted,
    /// Application reached a terminal state.
    ///
    /// Sets: `app`, `reason` (final state)
    AppFinished,

    // === Containers ===
    /// Container handed out and armed in the allocation expirer.
    ///
    /// Sets: `app`, `container`, `node`, `resource`
    ContainerAllocated,
    /// Allocation acknowledged; expiry disarmed.
    ///
    /// Sets: `app`, `container`
    ContainerLaunched,
    /// Container resources returned to the pool through a normal path.
    ///
    /// Sets: `app`, `container`, `resource`, `reason` (`completed`, `app_removed`,
    /// `node_lost`, `node_decommissioned`)
    ContainerReleased,
    /// Allocation was never acknowledged; resources reclaimed.
    ///
    /// Sets: `app`, `container`, `resource`
    ContainerExpired,

    // === Faults ===
    /// A tracker refused an event.
    ///
    /// Sets: `reason` (error label), and the key of the refused event when known
    EventRejected,
    /// A handler returned an error.
    ///
    /// Sets: `handler`, `reason`
    HandlerFailed,
    /// A handler panicked.
    ///
    /// Sets: `handler`, `reason` (panic message)
    HandlerPanicked,
    /// A subscriber dropped a notice (queue full or worker closed).
    ///
    /// Sets: `handler` (subscriber name), `reason`
    SubscriberOverflow,
    /// A subscriber panicked while processing a notice.
    ///
    /// Sets: `handler` (subscriber name), `reason`
    SubscriberPanicked,
}

/// Monitoring record with optional metadata.
///
/// - `seq`: stamped by the [`Bus`](super::Bus) on publish (monotonic per bus)
/// - `at`: wall-clock timestamp
/// - other fields are set depending on the [`NoticeKind`]
#[derive(Clone, Debug)]
pub struct Notice {
    pub seq: u64,
    pub at: SystemTime,
    pub kind: NoticeKind,
    pub node: Option<NodeId>,
    pub app: Option<AppId>,
    pub container: Option<ContainerId>,
    pub resource: Option<Resource>,
    /// Handler or subscriber name for fault notices.
    pub handler: Option<&'static str>,
    /// Human-readable reason (error label, final state, panic message).
    pub reason: Option<Arc<str>>,
}

impl Notice {
    pub fn new(kind: NoticeKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            node: None,
            app: None,
            container: None,
            resource: None,
            handler: None,
            reason: None,
        }
    }

    #[inline]
    pub fn with_node(mut self, node: impl Into<NodeId>) -> Self {
        self.node = Some(node.into());
        self
    }

    #[inline]
    pub fn with_app(mut self, app: impl Into<AppId>) -> Self {
        self.app = Some(app.into());
        self
    }

    #[inline]
    pub fn with_container(mut self, container: impl Into<ContainerId>) -> Self {
        self.container = Some(container.into());
        self
    }

    #[inline]
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resource = Some(resource);
        self
    }

    #[inline]
    pub fn with_handler(mut self, handler: &'static str) -> Self {
        self.handler = Some(handler);
        self
    }

    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow notice.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Notice::new(NoticeKind::SubscriberOverflow)
            .with_handler(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic notice.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Notice::new(NoticeKind::SubscriberPanicked)
            .with_handler(subscriber)
            .with_reason(info)
    }
}
