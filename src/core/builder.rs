use std::sync::Arc;

use super::manager::{Listener, ResourceManager};
use crate::{
    apps::{AppIdGenerator, AppTracker},
    config::Config,
    counters::Counters,
    dispatch::{Dispatcher, Handler},
    error::RuntimeError,
    events::{Bus, EventKind},
    monitor::LivelinessMonitor,
    nodes::NodeTracker,
    pool::{FreePool, ResourcePool},
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for a [`ResourceManager`].
pub struct ResourceManagerBuilder {
    cfg: Config,
    pool: Option<Arc<dyn ResourcePool>>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    handlers: Vec<(EventKind, Arc<dyn Handler>)>,
}

impl ResourceManagerBuilder {
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            pool: None,
            subscribers: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Replaces the built-in [`FreePool`] sized by `Config::cluster_capacity`.
    pub fn with_pool(mut self, pool: Arc<dyn ResourcePool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Sets notice subscribers.
    ///
    /// Each one gets a dedicated worker with a bounded queue.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds an event handler (typically the scheduler).
    ///
    /// Handlers added here run after the built-in trackers for the same kind, so they
    /// observe the trackers' state already updated by the event.
    pub fn with_handler(mut self, kind: EventKind, handler: Arc<dyn Handler>) -> Self {
        self.handlers.push((kind, handler));
        self
    }

    /// Builds the manager. Workers are not running until [`ResourceManager::start`].
    ///
    /// Must be called inside a tokio runtime (subscriber workers are spawned here).
    pub fn build(self) -> Result<Arc<ResourceManager>, RuntimeError> {
        let cfg = self.cfg;
        let bus = Bus::new(cfg.bus_capacity_clamped());
        let counters = Arc::new(Counters::new());
        let pool = self
            .pool
            .unwrap_or_else(|| Arc::new(FreePool::new(cfg.cluster_capacity)));

        let heartbeats = Arc::new(LivelinessMonitor::new(
            "node-heartbeat",
            cfg.node_expiry,
            cfg.node_check_interval(),
        ));
        let expirer = Arc::new(LivelinessMonitor::new(
            "container-allocation",
            cfg.container_expiry,
            cfg.container_check_interval(),
        ));

        let apps = AppTracker::new(
            Arc::clone(&pool),
            Arc::clone(&expirer),
            cfg.max_capability,
            bus.clone(),
            Arc::clone(&counters),
        );
        let nodes = NodeTracker::new(
            Arc::clone(&heartbeats),
            apps.clone(),
            bus.clone(),
            Arc::clone(&counters),
        );

        let dispatcher = Dispatcher::new(bus.clone(), Arc::clone(&counters));
        dispatcher.register_all(
            &[EventKind::NodeAdded, EventKind::NodeRemoved, EventKind::NodeUpdate],
            nodes.clone(),
        )?;
        dispatcher.register_all(
            &[EventKind::AppAdded, EventKind::AppRemoved, EventKind::ContainerExpired],
            apps.clone(),
        )?;
        for (kind, handler) in self.handlers {
            dispatcher.register(kind, handler)?;
        }

        let listener = Listener {
            rx: bus.subscribe(),
            subs: SubscriberSet::new(self.subscribers, bus.clone()),
        };
        let ids = AppIdGenerator::new(cfg.resolved_cluster_timestamp(), cfg.max_capability);

        Ok(Arc::new(ResourceManager::new_internal(
            cfg, bus, counters, pool, dispatcher, nodes, apps, heartbeats, expirer, ids, listener,
        )))
    }
}
