//! # LogWriter: notices rendered through `tracing`
//!
//! Lifecycle notices go out at `info`, expiries and node loss at `warn`,
//! faults at `error`. Rejections are `debug`: the trackers already logged them
//! with full context.

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Notice, NoticeKind};
use crate::subscribers::Subscribe;

/// Notice writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_notice(&self, n: &Notice) {
        let node = n.node.as_ref().map(|x| x.as_str()).unwrap_or("-");
        let app = n.app.as_ref().map(|x| x.as_str()).unwrap_or("-");
        let container = n.container.as_ref().map(|x| x.as_str()).unwrap_or("-");
        let reason = n.reason.as_deref().unwrap_or("-");

        match n.kind {
            NoticeKind::NodeRegistered => info!(seq = n.seq, node, "node registered"),
            NoticeKind::NodeRunning => info!(seq = n.seq, node, "node running"),
            NoticeKind::NodeUnhealthy => warn!(seq = n.seq, node, reason, "node unhealthy"),
            NoticeKind::NodeLost => warn!(seq = n.seq, node, "node lost"),
            NoticeKind::NodeDecommissioned => info!(seq = n.seq, node, "node decommissioned"),
            NoticeKind::AppSubmitted => info!(seq = n.seq, app, "application submitted"),
            NoticeKind::AppFinished => {
                info!(seq = n.seq, app, final_state = reason, "application finished")
            }
            NoticeKind::ContainerAllocated => info!(
                seq = n.seq,
                app,
                container,
                node,
                resource = ?n.resource,
                "container allocated"
            ),
            NoticeKind::ContainerLaunched => info!(seq = n.seq, app, container, "container launched"),
            NoticeKind::ContainerReleased => {
                info!(seq = n.seq, app, container, reason, "container released")
            }
            NoticeKind::ContainerExpired => warn!(
                seq = n.seq,
                app,
                container,
                resource = ?n.resource,
                "container allocation expired"
            ),
            NoticeKind::EventRejected => debug!(seq = n.seq, reason, "event rejected"),
            NoticeKind::HandlerFailed | NoticeKind::HandlerPanicked => error!(
                seq = n.seq,
                handler = n.handler.unwrap_or("unknown"),
                reason,
                kind = ?n.kind,
                "handler fault"
            ),
            NoticeKind::SubscriberOverflow | NoticeKind::SubscriberPanicked => warn!(
                seq = n.seq,
                subscriber = n.handler.unwrap_or("unknown"),
                reason,
                kind = ?n.kind,
                "subscriber fault"
            ),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
