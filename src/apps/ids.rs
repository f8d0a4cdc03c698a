use std::sync::atomic::{AtomicU32, Ordering};

use crate::model::{AppId, Resource};

/// Answer to a "new application" request: a fresh id plus the largest
/// container the cluster will grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewApplication {
    pub app_id: AppId,
    pub max_capability: Resource,
}

/// Allocates application ids of the form `application_<cluster_ts>_<seq>`.
///
/// `seq` starts at 1 and is zero-padded to four digits (wider once it outgrows them).
#[derive(Debug)]
pub struct AppIdGenerator {
    cluster_timestamp: u64,
    max_capability: Resource,
    next: AtomicU32,
}

impl AppIdGenerator {
    pub fn new(cluster_timestamp: u64, max_capability: Resource) -> Self {
        Self {
            cluster_timestamp,
            max_capability,
            next: AtomicU32::new(1),
        }
    }

    pub fn cluster_timestamp(&self) -> u64 {
        self.cluster_timestamp
    }

    pub fn next(&self) -> NewApplication {
        let seq = self.next.fetch_add(1, Ordering::Relaxed);
        NewApplication {
            app_id: AppId::new(format!("application_{}_{:04}", self.cluster_timestamp, seq)),
            max_capability: self.max_capability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential() {
        let g = AppIdGenerator::new(1700000000000, Resource::new(8192, 4));
        let a = g.next();
        let b = g.next();
        assert_eq!(a.app_id.as_str(), "application_1700000000000_0001");
        assert_eq!(b.app_id.as_str(), "application_1700000000000_0002");
        assert_eq!(a.max_capability, Resource::new(8192, 4));
    }

    #[test]
    fn test_wide_sequence_is_not_truncated() {
        let g = AppIdGenerator::new(1, Resource::ZERO);
        g.next.store(12345, Ordering::Relaxed);
        assert_eq!(g.next().app_id.as_str(), "application_1_12345");
    }
}
