//! Per-label event counters.
//!
//! Trackers and the dispatcher bump a counter for every rejection, expiry and
//! handler fault, keyed by the stable `as_label()` of what happened. Reads are
//! synchronous so callers can sample them without going through the notice bus.

use std::collections::BTreeMap;

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct Counters {
    inner: Mutex<BTreeMap<&'static str, u64>>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, label: &'static str) {
        *self.inner.lock().entry(label).or_insert(0) += 1;
    }

    /// Current value for `label` (0 if never incremented).
    pub fn get(&self, label: &str) -> u64 {
        self.inner.lock().get(label).copied().unwrap_or(0)
    }

    /// Copy of all non-zero counters, sorted by label.
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incr_and_snapshot() {
        let c = Counters::new();
        c.incr("stale_heartbeat");
        c.incr("stale_heartbeat");
        c.incr("expiry_race");

        assert_eq!(c.get("stale_heartbeat"), 2);
        assert_eq!(c.get("unknown_node"), 0);
        let snap: Vec<_> = c.snapshot().into_iter().collect();
        assert_eq!(snap, vec![("expiry_race", 1), ("stale_heartbeat", 2)]);
    }
}
