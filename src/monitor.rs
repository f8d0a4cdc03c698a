//! # Deadline watchdog keyed by entity.
//!
//! [`LivelinessMonitor`] remembers, per key, a deadline and the [`Epoch`] of the
//! registration that armed it. A periodic task removes due entries and hands them
//! to a callback; the callback only enqueues an event, it never touches tracker state.
//!
//! Two instances run in a resource manager:
//! - **heartbeat monitor** (`NodeId`): re-armed by every accepted heartbeat, expiry
//!   becomes `NodeRemoved { cause: Lost { epoch } }`;
//! - **allocation expirer** (`ContainerId`): armed on allocation, disarmed on launch or
//!   release, expiry becomes `ContainerExpired { epoch }`.
//!
//! ## Rules
//! - `register` always yields a fresh, strictly larger epoch.
//! - An entry is due when `deadline <= now`; due entries are removed in the same
//!   critical section that reports them, so each registration expires at most once.
//! - `unregister` and `expire_due` take the same lock: once `unregister` returns, the
//!   key can no longer be reported for that registration.
//! - An expiry already reported before `unregister` won is caught downstream by its epoch.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::model::Epoch;

#[derive(Debug, Clone, Copy)]
struct Entry {
    deadline: Instant,
    epoch: Epoch,
}

/// Deadline tracker with per-registration epochs.
pub struct LivelinessMonitor<K> {
    name: &'static str,
    expire_after: Duration,
    check_every: Duration,
    entries: Mutex<HashMap<K, Entry>>,
    next_epoch: AtomicU64,
}

impl<K> LivelinessMonitor<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    /// Creates a monitor whose entries expire `expire_after` past their last (re)arm,
    /// checked every `check_every` (clamped to at least 1ms).
    pub fn new(name: &'static str, expire_after: Duration, check_every: Duration) -> Self {
        Self {
            name,
            expire_after,
            check_every: check_every.max(Duration::from_millis(1)),
            entries: Mutex::new(HashMap::new()),
            next_epoch: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn expire_after(&self) -> Duration {
        self.expire_after
    }

    /// Arms `key` with a new deadline and returns the epoch of this registration.
    ///
    /// Replaces any previous registration of the same key.
    pub fn register(&self, key: K) -> Epoch {
        let epoch = Epoch(self.next_epoch.fetch_add(1, Ordering::Relaxed) + 1);
        let entry = Entry {
            deadline: Instant::now() + self.expire_after,
            epoch,
        };
        self.entries.lock().insert(key, entry);
        epoch
    }

    /// Pushes the deadline of `key` forward. Returns false if `key` is not armed.
    pub fn ping(&self, key: &K) -> bool {
        match self.entries.lock().get_mut(key) {
            Some(entry) => {
                entry.deadline = Instant::now() + self.expire_after;
                true
            }
            None => false,
        }
    }

    /// Disarms `key`, returning the epoch it was armed with.
    pub fn unregister(&self, key: &K) -> Option<Epoch> {
        self.entries.lock().remove(key).map(|e| e.epoch)
    }

    /// Epoch of the current registration of `key`, if armed.
    pub fn epoch_of(&self, key: &K) -> Option<Epoch> {
        self.entries.lock().get(key).map(|e| e.epoch)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Removes and returns every entry due at `now`, oldest registration first.
    pub fn expire_due(&self, now: Instant) -> Vec<(K, Epoch)> {
        let mut due = Vec::new();
        self.entries.lock().retain(|key, entry| {
            if entry.deadline <= now {
                due.push((key.clone(), entry.epoch));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(_, epoch)| *epoch);
        due
    }

    /// Spawns the periodic check. Runs until `token` is cancelled.
    pub fn spawn<F>(self: Arc<Self>, token: CancellationToken, mut on_expire: F) -> JoinHandle<()>
    where
        F: FnMut(K, Epoch) + Send + 'static,
    {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.check_every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        for (key, epoch) in self.expire_due(Instant::now()) {
                            debug!(monitor = self.name, ?key, %epoch, "deadline elapsed");
                            on_expire(key, epoch);
                        }
                    }
                }
            }
            debug!(monitor = self.name, "monitor stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> LivelinessMonitor<&'static str> {
        LivelinessMonitor::new("test", Duration::from_secs(30), Duration::from_secs(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_at_deadline_once() {
        let m = monitor();
        let epoch = m.register("c9");

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(m.expire_due(Instant::now()).is_empty());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(m.expire_due(Instant::now()), vec![("c9", epoch)]);
        assert!(m.expire_due(Instant::now()).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_and_unregister() {
        let m = monitor();
        m.register("n1");

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(m.ping(&"n1"));
        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(m.expire_due(Instant::now()).is_empty());

        assert!(m.unregister(&"n1").is_some());
        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(m.expire_due(Instant::now()).is_empty());
        assert!(!m.ping(&"n1"));
    }

    #[test]
    fn test_reregister_bumps_epoch() {
        let m = monitor();
        let first = m.register("n1");
        let second = m.register("n1");
        assert!(second > first);
        assert_eq!(m.epoch_of(&"n1"), Some(second));
        assert_eq!(m.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_checker_reports_through_callback() {
        let m = Arc::new(monitor());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let handle = Arc::clone(&m).spawn(token.clone(), move |k, e| {
            let _ = tx.send((k, e));
        });

        let keep = m.register("keep");
        let drop_me = m.register("drop");
        m.unregister(&"drop");

        tokio::time::sleep(Duration::from_secs(32)).await;
        assert_eq!(rx.recv().await, Some(("keep", keep)));
        assert!(rx.try_recv().is_err());
        assert_ne!(keep, drop_me);

        token.cancel();
        handle.await.unwrap();
    }
}
