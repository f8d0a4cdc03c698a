//! # Notice bus for monitoring.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`]: trackers, the
//! dispatcher and subscriber workers publish [`Notice`]s without blocking, and the
//! manager's listener forwards them to the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never waits.
//! - **Sequenced**: every published notice gets the next per-bus `seq`.
//! - **Bounded**: one ring buffer of `capacity`; lagging receivers skip the oldest items.
//! - **No persistence**: notices are lost if nobody is subscribed at send time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;

use super::notice::Notice;

/// Broadcast channel for [`Notice`]s.
///
/// Cheap to clone; all clones share the channel and the sequence counter.
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Notice>,
    seq: Arc<AtomicU64>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _rx) = broadcast::channel::<Notice>(capacity);
        Self {
            tx,
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Stamps the notice with the next sequence number and broadcasts it.
    ///
    /// If there are no receivers the notice is dropped.
    pub fn publish(&self, mut notice: Notice) {
        notice.seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let _ = self.tx.send(notice);
    }

    /// Creates a receiver that observes notices published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoticeKind;

    #[tokio::test]
    async fn test_publish_stamps_increasing_seq() {
        let bus = Bus::new(8);
        let mut rx = bus.subscribe();

        bus.publish(Notice::new(NoticeKind::NodeRegistered).with_node("n1"));
        bus.clone()
            .publish(Notice::new(NoticeKind::NodeRunning).with_node("n1"));

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        assert_eq!(a.kind, NoticeKind::NodeRegistered);
        assert_eq!(b.kind, NoticeKind::NodeRunning);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_publish_without_receivers_is_noop() {
        let bus = Bus::new(0);
        bus.publish(Notice::new(NoticeKind::NodeLost));
    }
}
