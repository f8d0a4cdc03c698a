//! # Global runtime configuration.
//!
//! Provides [`Config`], the settings read once by
//! [`ResourceManager::builder`](crate::ResourceManager::builder).
//!
//! ## Sentinel values
//! - `monitor_interval = 0s` → each monitor checks at a third of its own expiry interval
//! - `cluster_timestamp = 0` → wall-clock milliseconds at build time

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::model::Resource;

/// Global configuration for the resource manager core.
///
/// ## Field semantics
/// - `grace`: maximum wait for workers to stop on shutdown (`0s` = no wait)
/// - `bus_capacity`: notice bus ring buffer size (min 1; clamped by Bus)
/// - `node_expiry`: heartbeat silence after which a node is declared lost
/// - `container_expiry`: time an allocated container may stay unacknowledged
/// - `monitor_interval`: period of both expiry checks (`0s` = expiry / 3)
/// - `max_capability`: largest single container an application may request
/// - `cluster_capacity`: total capacity of the default [`FreePool`](crate::FreePool)
/// - `cluster_timestamp`: prefix of generated application ids (`0` = now)
///
/// All fields are public. Prefer the accessors over checking sentinels inline.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for graceful shutdown.
    ///
    /// On shutdown the monitors and the dispatch loop are cancelled, queued events are
    /// still delivered, and the manager waits up to `grace` before returning
    /// `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the notice broadcast ring buffer.
    ///
    /// A listener lagging more than `bus_capacity` notices skips the oldest ones.
    pub bus_capacity: usize,

    /// Heartbeat expiry interval for nodes.
    pub node_expiry: Duration,

    /// Allocation expiry interval for containers not yet launched.
    pub container_expiry: Duration,

    /// How often the monitors look for elapsed deadlines.
    ///
    /// - `Duration::ZERO` = a third of the monitor's own expiry interval
    /// - `> 0` = this period for both monitors
    pub monitor_interval: Duration,

    /// Maximum resource of a single container.
    pub max_capability: Resource,

    /// Capacity of the built-in free pool.
    pub cluster_capacity: Resource,

    /// Start time of the cluster in epoch milliseconds; `0` resolves to now.
    pub cluster_timestamp: u64,
}

impl Config {
    /// Check period of the heartbeat monitor.
    #[inline]
    pub fn node_check_interval(&self) -> Duration {
        self.check_interval(self.node_expiry)
    }

    /// Check period of the allocation expirer.
    #[inline]
    pub fn container_check_interval(&self) -> Duration {
        self.check_interval(self.container_expiry)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Resolves the `0` sentinel of `cluster_timestamp` to the current time.
    pub fn resolved_cluster_timestamp(&self) -> u64 {
        if self.cluster_timestamp != 0 {
            return self.cluster_timestamp;
        }
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(1)
    }

    fn check_interval(&self, expiry: Duration) -> Duration {
        let every = if self.monitor_interval.is_zero() {
            expiry / 3
        } else {
            self.monitor_interval
        };
        // tokio::time::interval panics on a zero period.
        every.max(Duration::from_millis(1))
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 30s`
    /// - `bus_capacity = 1024`
    /// - `node_expiry = 600s`, `container_expiry = 600s`
    /// - `monitor_interval = 0s` (expiry / 3)
    /// - `max_capability = <8192MB, 4 vcores>`
    /// - `cluster_capacity = <65536MB, 64 vcores>`
    /// - `cluster_timestamp = 0` (now)
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(30),
            bus_capacity: 1024,
            node_expiry: Duration::from_secs(600),
            container_expiry: Duration::from_secs(600),
            monitor_interval: Duration::ZERO,
            max_capability: Resource::new(8192, 4),
            cluster_capacity: Resource::new(65536, 64),
            cluster_timestamp: 0,
        }
    }
}
