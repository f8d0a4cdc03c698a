//! # ResourceManager: owns the dispatch loop, the monitors and notice delivery.
//!
//! ## Architecture
//! ```text
//! heartbeat transport ──┐
//! submission client   ──┼── dispatch(SchedulerEvent) ──► Dispatcher loop
//! heartbeat monitor   ──┤      (NodeRemoved{Lost})         ├─► NodeTracker ──Reconcile──► AppTracker
//! allocation expirer  ──┘      (ContainerExpired)          ├─► AppTracker
//!                                                          └─► user handlers (scheduler)
//!
//! trackers/dispatcher ── publish(Notice) ──► Bus ──► notice listener ──► SubscriberSet::emit
//!
//! Shutdown path:
//!   runtime_token.cancel()
//!     ├─► monitors stop checking deadlines
//!     └─► dispatch loop delivers what is queued, then exits
//!   listener_token.cancel() ─► pending notices forwarded, subscriber queues drained
//!   all of it bounded by Config::grace ─► RuntimeError::GraceExceeded
//! ```
//!
//! ## Example
//! ```rust
//! use rmvisor::{Config, ResourceManager, SchedulerEvent, NodeState};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rm = ResourceManager::builder(Config::default()).build()?;
//!     rm.start()?;
//!
//!     rm.dispatch(SchedulerEvent::node_added("node-1"))?;
//!     rm.drained().await?;
//!     assert_eq!(rm.nodes().state(&"node-1".into()).await, Some(NodeState::New));
//!
//!     rm.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::builder::ResourceManagerBuilder;
use super::shutdown;
use crate::{
    apps::{AppIdGenerator, AppTracker, NewApplication},
    config::Config,
    counters::Counters,
    dispatch::{DispatchHandle, Dispatcher, Handler},
    error::{DispatchError, RuntimeError},
    events::{Bus, EventKind, Notice, SchedulerEvent},
    model::{ContainerId, NodeId},
    monitor::LivelinessMonitor,
    nodes::NodeTracker,
    pool::ResourcePool,
    subscribers::SubscriberSet,
};

/// Notice receiver and subscriber set, parked until `start`.
pub(super) struct Listener {
    pub(super) rx: broadcast::Receiver<Notice>,
    pub(super) subs: SubscriberSet,
}

/// The node/application event core of a cluster resource manager.
pub struct ResourceManager {
    cfg: Config,
    bus: Bus,
    counters: Arc<Counters>,
    pool: Arc<dyn ResourcePool>,
    dispatcher: Arc<Dispatcher>,
    nodes: Arc<NodeTracker>,
    apps: Arc<AppTracker>,
    heartbeats: Arc<LivelinessMonitor<NodeId>>,
    expirer: Arc<LivelinessMonitor<ContainerId>>,
    ids: AppIdGenerator,

    listener: Mutex<Option<Listener>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    notices: Mutex<Option<JoinHandle<()>>>,
    runtime_token: CancellationToken,
    listener_token: CancellationToken,
}

impl ResourceManager {
    /// Returns a builder for the given configuration.
    pub fn builder(cfg: Config) -> ResourceManagerBuilder {
        ResourceManagerBuilder::new(cfg)
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn new_internal(
        cfg: Config,
        bus: Bus,
        counters: Arc<Counters>,
        pool: Arc<dyn ResourcePool>,
        dispatcher: Arc<Dispatcher>,
        nodes: Arc<NodeTracker>,
        apps: Arc<AppTracker>,
        heartbeats: Arc<LivelinessMonitor<NodeId>>,
        expirer: Arc<LivelinessMonitor<ContainerId>>,
        ids: AppIdGenerator,
        listener: Listener,
    ) -> Self {
        Self {
            cfg,
            bus,
            counters,
            pool,
            dispatcher,
            nodes,
            apps,
            heartbeats,
            expirer,
            ids,
            listener: Mutex::new(Some(listener)),
            workers: Mutex::new(Vec::new()),
            notices: Mutex::new(None),
            runtime_token: CancellationToken::new(),
            listener_token: CancellationToken::new(),
        }
    }

    /// Spawns the dispatch loop, the notice listener and both monitors.
    ///
    /// Can be called once; a second call fails with `DispatchError::AlreadyRunning`.
    pub fn start(&self) -> Result<(), RuntimeError> {
        let Listener { rx, subs } = self
            .listener
            .lock()
            .take()
            .ok_or(DispatchError::AlreadyRunning)?;

        let mut workers = Vec::with_capacity(3);

        let dispatcher = Arc::clone(&self.dispatcher);
        let token = self.runtime_token.child_token();
        workers.push(tokio::spawn(async move {
            if let Err(err) = dispatcher.run(token).await {
                error!(error = %err, "dispatch loop not started");
            }
        }));

        let handle = self.dispatcher.handle();
        workers.push(Arc::clone(&self.heartbeats).spawn(
            self.runtime_token.child_token(),
            move |node, epoch| {
                if let Err(err) = handle.dispatch(SchedulerEvent::node_lost(node, epoch)) {
                    debug!(error = %err, "node expiry not dispatched");
                }
            },
        ));

        let handle = self.dispatcher.handle();
        workers.push(Arc::clone(&self.expirer).spawn(
            self.runtime_token.child_token(),
            move |container, epoch| {
                if let Err(err) = handle.dispatch(SchedulerEvent::container_expired(container, epoch)) {
                    debug!(error = %err, "container expiry not dispatched");
                }
            },
        ));
        *self.workers.lock() = workers;

        let forward = forward_notices(
            rx,
            subs,
            self.listener_token.clone(),
            Arc::clone(&self.counters),
        );
        *self.notices.lock() = Some(tokio::spawn(forward));

        info!(
            node_expiry = ?self.cfg.node_expiry,
            container_expiry = ?self.cfg.container_expiry,
            cluster_timestamp = self.ids.cluster_timestamp(),
            "resource manager started"
        );
        Ok(())
    }

    /// Starts (if needed), waits for a termination signal, then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        match self.start() {
            Ok(()) | Err(RuntimeError::Dispatch(DispatchError::AlreadyRunning)) => {}
            Err(err) => return Err(err),
        }
        match shutdown::wait_for_termination().await {
            Ok(signal) => info!(%signal, "termination signal received"),
            Err(err) => warn!(error = %err, "signal handlers unavailable, shutting down"),
        }
        self.shutdown().await
    }

    /// Stops the monitors and the dispatch loop, then notice delivery.
    ///
    /// Events queued before the call are still handled. Returns
    /// `RuntimeError::GraceExceeded` if this takes longer than `Config::grace`;
    /// remaining workers are aborted in that case.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let grace = self.cfg.grace;
        info!(?grace, "shutdown requested");
        self.runtime_token.cancel();

        let idle = self.listener.lock().take();
        if let Some(Listener { subs, .. }) = idle {
            subs.shutdown().await;
        }

        let mut workers = std::mem::take(&mut *self.workers.lock());
        let mut notices = self.notices.lock().take();
        let listener_token = self.listener_token.clone();

        let done = async {
            for h in workers.iter_mut() {
                if let Err(err) = h.await {
                    if err.is_panic() {
                        error!(error = %err, "worker panicked");
                    }
                }
            }
            listener_token.cancel();
            if let Some(h) = notices.as_mut() {
                let _ = h.await;
            }
        };

        match tokio::time::timeout(grace, done).await {
            Ok(()) => {
                info!("all workers stopped within grace");
                Ok(())
            }
            Err(_) => {
                self.listener_token.cancel();
                workers.iter().for_each(JoinHandle::abort);
                if let Some(h) = &notices {
                    h.abort();
                }
                warn!(?grace, "grace exceeded, workers aborted");
                Err(RuntimeError::GraceExceeded { grace })
            }
        }
    }

    /// Adds a handler for `kind`, after every handler already registered for it.
    pub fn register(&self, kind: EventKind, handler: Arc<dyn Handler>) -> Result<(), DispatchError> {
        self.dispatcher.register(kind, handler)
    }

    /// Enqueues an event on the dispatch loop.
    pub fn dispatch(&self, event: SchedulerEvent) -> Result<(), DispatchError> {
        self.dispatcher.dispatch(event)
    }

    /// Returns a cloneable submission handle for producers.
    pub fn handle(&self) -> DispatchHandle {
        self.dispatcher.handle()
    }

    /// Waits until every event dispatched before the call has been handled.
    pub async fn drained(&self) -> Result<(), DispatchError> {
        self.dispatcher.handle().drained().await
    }

    /// Allocates a fresh application id and reports the maximum container size.
    pub fn new_application(&self) -> NewApplication {
        self.ids.next()
    }

    pub fn nodes(&self) -> &Arc<NodeTracker> {
        &self.nodes
    }

    pub fn apps(&self) -> &Arc<AppTracker> {
        &self.apps
    }

    pub fn pool(&self) -> &Arc<dyn ResourcePool> {
        &self.pool
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Receiver of notices published after this call.
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.bus.subscribe()
    }
}

/// Forwards bus notices to the subscriber set until cancelled, then drains both.
async fn forward_notices(
    mut rx: broadcast::Receiver<Notice>,
    subs: SubscriberSet,
    token: CancellationToken,
    counters: Arc<Counters>,
) {
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            res = rx.recv() => match res {
                Ok(notice) => subs.emit(notice),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "notice listener lagged");
                    counters.incr("notices_lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
    while let Ok(notice) = rx.try_recv() {
        subs.emit(notice);
    }
    subs.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apps::AppState;
    use crate::events::{Envelope, FinalState, NoticeKind};
    use crate::model::{
        AppId, ContainerStatus, NodeHealthStatus, NodeStatusEvent, Resource, ResponseId,
    };
    use crate::nodes::NodeState;
    use crate::subscribers::Subscribe;
    use crate::error::HandlerError;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::time::Duration;

    const C9: Resource = Resource::new(2048, 1);

    fn config() -> Config {
        Config {
            container_expiry: Duration::from_secs(30),
            monitor_interval: Duration::from_secs(1),
            cluster_capacity: Resource::new(16384, 8),
            cluster_timestamp: 1700000000000,
            ..Config::default()
        }
    }

    fn heartbeat(node: &str, token: u64, running: &[(&str, &str)]) -> SchedulerEvent {
        let mut map: BTreeMap<AppId, Vec<ContainerStatus>> = BTreeMap::new();
        for (app, c) in running {
            map.entry(AppId::from(*app))
                .or_default()
                .push(ContainerStatus::running(*c));
        }
        SchedulerEvent::node_update(NodeStatusEvent::new(
            node.into(),
            NodeHealthStatus::healthy(),
            map,
            ResponseId(token),
        ))
    }

    /// Records every envelope it sees, with the node tracker's view at that moment.
    struct Probe {
        nodes: Arc<NodeTracker>,
        seen: Mutex<Vec<(u64, EventKind, Option<NodeState>)>>,
    }

    impl Probe {
        fn new(nodes: &Arc<NodeTracker>) -> Arc<Self> {
            Arc::new(Self {
                nodes: Arc::clone(nodes),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn count(&self, kind: EventKind) -> usize {
            self.seen.lock().iter().filter(|(_, k, _)| *k == kind).count()
        }
    }

    #[async_trait]
    impl Handler for Probe {
        async fn handle(&self, env: &Envelope) -> Result<(), HandlerError> {
            let state = self.nodes.state(&"node-1".into()).await;
            self.seen.lock().push((env.seq, env.event.kind(), state));
            Ok(())
        }
        fn name(&self) -> &'static str {
            "probe"
        }
    }

    async fn started(cfg: Config) -> (Arc<ResourceManager>, Arc<Probe>) {
        let rm = ResourceManager::builder(cfg).build().unwrap();
        let probe = Probe::new(rm.nodes());
        for kind in EventKind::ALL {
            rm.register(kind, probe.clone()).unwrap();
        }
        rm.start().unwrap();
        (rm, probe)
    }

    async fn running_app(rm: &ResourceManager) -> AppId {
        let app = AppId::from("app-2");
        rm.dispatch(SchedulerEvent::app_added(app.clone())).unwrap();
        rm.drained().await.unwrap();
        rm.apps().accept(&app).await.unwrap();
        app
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_added_then_healthy_heartbeat() {
        let (rm, _) = started(config()).await;
        rm.dispatch(SchedulerEvent::node_added("node-1")).unwrap();
        rm.drained().await.unwrap();
        assert_eq!(rm.nodes().state(&"node-1".into()).await, Some(NodeState::New));

        rm.dispatch(heartbeat("node-1", 1, &[])).unwrap();
        rm.drained().await.unwrap();
        assert_eq!(rm.nodes().state(&"node-1".into()).await, Some(NodeState::Running));
        rm.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_replayed_heartbeat_keeps_two_containers() {
        let (rm, _) = started(config()).await;
        rm.dispatch(SchedulerEvent::node_added("node-1")).unwrap();
        let hb = heartbeat("node-1", 5, &[("app-1", "c1"), ("app-1", "c2")]);
        rm.dispatch(hb.clone()).unwrap();
        rm.drained().await.unwrap();
        let once = rm.nodes().report(&"node-1".into()).await.unwrap();

        rm.dispatch(hb).unwrap();
        rm.drained().await.unwrap();
        let twice = rm.nodes().report(&"node-1".into()).await.unwrap();
        assert_eq!(twice.containers.len(), 2);
        assert_eq!(twice, once);
        assert_eq!(rm.counters().get("stale_heartbeat"), 1);
        rm.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unacknowledged_container_expires_once() {
        let (rm, probe) = started(config()).await;
        let app = running_app(&rm).await;
        let total = rm.pool().available();

        rm.apps()
            .allocate(&app, "c9".into(), "node-1".into(), C9)
            .await
            .unwrap();
        assert_eq!(rm.pool().available(), total.saturating_sub(C9));

        tokio::time::sleep(Duration::from_secs(29)).await;
        rm.drained().await.unwrap();
        assert_eq!(probe.count(EventKind::ContainerExpired), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        rm.drained().await.unwrap();
        assert_eq!(probe.count(EventKind::ContainerExpired), 1);
        assert_eq!(rm.pool().available(), total);

        tokio::time::sleep(Duration::from_secs(120)).await;
        rm.drained().await.unwrap();
        assert_eq!(probe.count(EventKind::ContainerExpired), 1);
        assert_eq!(rm.pool().available(), total);
        assert_eq!(rm.counters().get("container_expired"), 1);
        assert!(rm.apps().containers(&app).await.is_empty());
        rm.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_app_removed_cancels_pending_expiry() {
        let (rm, probe) = started(config()).await;
        let app = running_app(&rm).await;
        let total = rm.pool().available();
        rm.apps()
            .allocate(&app, "c9".into(), "node-1".into(), C9)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(10)).await;
        rm.dispatch(SchedulerEvent::app_removed(app.clone(), FinalState::Killed))
            .unwrap();
        rm.drained().await.unwrap();
        assert_eq!(rm.apps().state(&app).await, Some(AppState::Killed));
        assert_eq!(rm.pool().available(), total);

        tokio::time::sleep(Duration::from_secs(120)).await;
        rm.drained().await.unwrap();
        assert_eq!(probe.count(EventKind::ContainerExpired), 0);
        assert_eq!(rm.pool().available(), total);
        rm.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_launched_container_never_expires() {
        let (rm, probe) = started(config()).await;
        let app = running_app(&rm).await;
        rm.dispatch(SchedulerEvent::node_added("node-1")).unwrap();
        rm.drained().await.unwrap();
        rm.apps()
            .allocate(&app, "c1".into(), "node-1".into(), C9)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_secs(20)).await;
        rm.dispatch(heartbeat("node-1", 1, &[("app-2", "c1")])).unwrap();
        rm.drained().await.unwrap();
        assert_eq!(rm.apps().state(&app).await, Some(AppState::Running));

        tokio::time::sleep(Duration::from_secs(60)).await;
        rm.drained().await.unwrap();
        assert_eq!(probe.count(EventKind::ContainerExpired), 0);
        assert!(rm.apps().allocation(&"c1".into()).await.unwrap().launched);
        rm.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_node_credits_each_container_once() {
        let cfg = Config {
            node_expiry: Duration::from_secs(30),
            container_expiry: Duration::from_secs(60),
            ..config()
        };
        let (rm, probe) = started(cfg).await;
        let app = running_app(&rm).await;
        let total = rm.pool().available();

        rm.dispatch(SchedulerEvent::node_added("node-1")).unwrap();
        rm.drained().await.unwrap();
        for c in ["c1", "c2"] {
            rm.apps()
                .allocate(&app, c.into(), "node-1".into(), C9)
                .await
                .unwrap();
        }
        rm.dispatch(heartbeat("node-1", 1, &[("app-2", "c1")])).unwrap();
        rm.drained().await.unwrap();

        tokio::time::sleep(Duration::from_secs(35)).await;
        rm.drained().await.unwrap();
        assert_eq!(rm.nodes().state(&"node-1".into()).await, Some(NodeState::Lost));
        assert_eq!(rm.pool().available(), total);
        assert!(rm.apps().containers(&app).await.is_empty());

        // c2 would have expired at 60s had the node loss not released it.
        tokio::time::sleep(Duration::from_secs(120)).await;
        rm.drained().await.unwrap();
        assert_eq!(probe.count(EventKind::ContainerExpired), 0);
        assert_eq!(rm.pool().available(), total);
        rm.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_handlers_observe_events_in_submission_order() {
        let (rm, probe) = started(config()).await;
        let producer = rm.handle();

        rm.dispatch(SchedulerEvent::node_added("node-1")).unwrap();
        producer.dispatch(SchedulerEvent::app_added("app-1")).unwrap();
        rm.dispatch(heartbeat("node-1", 1, &[])).unwrap();
        producer
            .dispatch(SchedulerEvent::app_removed("app-1", FinalState::Finished))
            .unwrap();
        rm.drained().await.unwrap();

        let seen = probe.seen.lock().clone();
        assert_eq!(
            seen,
            vec![
                (1, EventKind::NodeAdded, Some(NodeState::New)),
                (2, EventKind::AppAdded, Some(NodeState::New)),
                (3, EventKind::NodeUpdate, Some(NodeState::Running)),
                (4, EventKind::AppRemoved, Some(NodeState::Running)),
            ]
        );
        rm.shutdown().await.unwrap();
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<NoticeKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_notice(&self, notice: &Notice) {
            self.seen.lock().push(notice.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_notices_reach_subscribers_before_shutdown_returns() {
        let rec = Arc::new(Recorder::default());
        let rm = ResourceManager::builder(config())
            .with_subscribers(vec![rec.clone()])
            .build()
            .unwrap();
        rm.start().unwrap();

        rm.dispatch(SchedulerEvent::node_added("node-1")).unwrap();
        rm.dispatch(SchedulerEvent::node_added("node-1")).unwrap();
        rm.drained().await.unwrap();
        rm.shutdown().await.unwrap();

        assert_eq!(
            *rec.seen.lock(),
            vec![NoticeKind::NodeRegistered, NoticeKind::EventRejected]
        );
        assert_eq!(rm.counters().get("duplicate_node"), 1);
    }

    struct Stuck;

    #[async_trait]
    impl Handler for Stuck {
        async fn handle(&self, _env: &Envelope) -> Result<(), HandlerError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_reports_grace_exceeded() {
        let cfg = Config {
            grace: Duration::from_secs(1),
            ..config()
        };
        let rm = ResourceManager::builder(cfg)
            .with_handler(EventKind::NodeAdded, Arc::new(Stuck))
            .build()
            .unwrap();
        rm.start().unwrap();
        rm.dispatch(SchedulerEvent::node_added("node-1")).unwrap();

        let err = rm.shutdown().await.unwrap_err();
        assert_eq!(err.as_label(), "runtime_grace_exceeded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_lifecycle_misuse() {
        let (rm, _) = started(config()).await;
        assert!(matches!(
            rm.start(),
            Err(RuntimeError::Dispatch(DispatchError::AlreadyRunning))
        ));

        rm.shutdown().await.unwrap();
        assert_eq!(
            rm.dispatch(SchedulerEvent::node_added("late")),
            Err(DispatchError::Closed)
        );
    }

    #[tokio::test]
    async fn test_new_application_ids() {
        let rm = ResourceManager::builder(config()).build().unwrap();
        let a = rm.new_application();
        let b = rm.new_application();
        assert_eq!(a.app_id.as_str(), "application_1700000000000_0001");
        assert_eq!(b.app_id.as_str(), "application_1700000000000_0002");
        assert_eq!(a.max_capability, Resource::new(8192, 4));
        rm.shutdown().await.unwrap();
    }
}
