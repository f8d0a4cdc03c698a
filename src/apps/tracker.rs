//! # Application tracker: applications, their containers, and allocation expiry.
//!
//! ## Event handling
//! ```text
//! Dispatcher ──► AppTracker::handle()
//!   ├─► AppAdded(app)                  → Submitted
//!   ├─► AppRemoved(app, final)         → terminal; release every container (credit, no expiry)
//!   └─► ContainerExpired(c, epoch)     → epoch matches & unlaunched ? reclaim : ExpiryRace
//!
//! NodeTracker ──► Reconcile
//!   ├─► containers_changed(delta)      → present: acknowledge, absent/completed: complete
//!   │                                     (only containers placed on the reporting node)
//!   └─► node_removed(node)             → release every container placed on the node
//! ```
//!
//! ## Rules
//! - Every release path goes through one helper that removes the allocation and credits the
//!   pool in the same critical section: a container is credited at most once.
//! - Acknowledging or releasing a container disarms its expirer entry under the same lock.
//! - `ContainerExpired` is honoured only for a still-pending allocation with the same epoch.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::state::{Allocation, AppState, ReleaseReason};
use crate::counters::Counters;
use crate::dispatch::{Handler, report_rejection};
use crate::error::{HandlerError, TrackerError};
use crate::events::{Bus, Envelope, FinalState, Notice, NoticeKind, RemovalCause, SchedulerEvent};
use crate::model::{AppId, ContainerId, Epoch, NodeId, Resource};
use crate::monitor::LivelinessMonitor;
use crate::nodes::{NodeDelta, Reconcile};
use crate::pool::ResourcePool;

struct AppRecord {
    state: AppState,
    containers: BTreeSet<ContainerId>,
}

/// Where a node report claims a container runs.
#[derive(Clone, Copy)]
struct Placement<'a> {
    node: &'a NodeId,
    app: &'a AppId,
}

#[derive(Default)]
struct Book {
    apps: HashMap<AppId, AppRecord>,
    allocations: HashMap<ContainerId, Allocation>,
}

/// Tracks applications and every container allocated to them.
pub struct AppTracker {
    book: Mutex<Book>,
    pool: Arc<dyn ResourcePool>,
    expirer: Arc<LivelinessMonitor<ContainerId>>,
    max_capability: Resource,
    bus: Bus,
    counters: Arc<Counters>,
}

impl AppTracker {
    pub fn new(
        pool: Arc<dyn ResourcePool>,
        expirer: Arc<LivelinessMonitor<ContainerId>>,
        max_capability: Resource,
        bus: Bus,
        counters: Arc<Counters>,
    ) -> Arc<Self> {
        Arc::new(Self {
            book: Mutex::new(Book::default()),
            pool,
            expirer,
            max_capability,
            bus,
            counters,
        })
    }

    /// Registers an application in `Submitted` with no containers.
    pub async fn add_app(&self, app: &AppId) -> Result<(), TrackerError> {
        let mut book = self.book.lock().await;
        if let Some(existing) = book.apps.get(app) {
            if !existing.state.is_terminal() {
                return Err(TrackerError::DuplicateApp {
                    app: app.clone(),
                    state: existing.state,
                });
            }
        }
        book.apps.insert(
            app.clone(),
            AppRecord {
                state: AppState::Submitted,
                containers: BTreeSet::new(),
            },
        );
        drop(book);

        info!(%app, "application submitted");
        self.bus
            .publish(Notice::new(NoticeKind::AppSubmitted).with_app(app.clone()));
        Ok(())
    }

    /// `Submitted → Accepted`.
    pub async fn accept(&self, app: &AppId) -> Result<(), TrackerError> {
        let mut book = self.book.lock().await;
        let rec = book
            .apps
            .get_mut(app)
            .ok_or_else(|| TrackerError::UnknownApp { app: app.clone() })?;
        if rec.state != AppState::Submitted {
            return Err(TrackerError::InvalidTransition {
                app: app.clone(),
                from: rec.state,
                to: AppState::Accepted,
            });
        }
        rec.state = AppState::Accepted;
        debug!(%app, "application accepted");
        Ok(())
    }

    /// Hands `container` on `node` to `app`, debits the pool and arms the expirer.
    ///
    /// Returns the epoch a later `ContainerExpired` must carry to be honoured.
    pub async fn allocate(
        &self,
        app: &AppId,
        container: ContainerId,
        node: NodeId,
        resource: Resource,
    ) -> Result<Epoch, TrackerError> {
        if !resource.fits_in(&self.max_capability) {
            return Err(TrackerError::InvalidResource {
                requested: resource,
                max: self.max_capability,
            });
        }

        let mut book = self.book.lock().await;
        let state = book
            .apps
            .get(app)
            .map(|r| r.state)
            .ok_or_else(|| TrackerError::UnknownApp { app: app.clone() })?;
        if state.is_terminal() {
            return Err(TrackerError::InactiveApp {
                app: app.clone(),
                state,
            });
        }
        if !state.can_allocate() {
            return Err(TrackerError::InvalidTransition {
                app: app.clone(),
                from: state,
                to: AppState::Running,
            });
        }
        if book.allocations.contains_key(&container) {
            return Err(TrackerError::DuplicateContainer { container });
        }

        self.pool.debit(resource)?;
        let epoch = self.expirer.register(container.clone());
        book.allocations.insert(
            container.clone(),
            Allocation {
                app: app.clone(),
                node: node.clone(),
                resource,
                epoch,
                launched: false,
            },
        );
        if let Some(rec) = book.apps.get_mut(app) {
            rec.containers.insert(container.clone());
        }
        drop(book);

        debug!(%app, %container, %node, %resource, %epoch, "container allocated");
        self.bus.publish(
            Notice::new(NoticeKind::ContainerAllocated)
                .with_app(app.clone())
                .with_container(container)
                .with_node(node)
                .with_resource(resource),
        );
        Ok(epoch)
    }

    /// Marks `container` launched: disarms its expiry and moves an `Accepted` app to `Running`.
    ///
    /// Acknowledging an already launched container is a no-op.
    pub async fn acknowledge(&self, container: &ContainerId) -> Result<(), TrackerError> {
        self.launch(container, None).await
    }

    /// Normal completion: returns the container's resources to the pool.
    pub async fn complete(&self, container: &ContainerId) -> Result<Resource, TrackerError> {
        self.finish(container, None).await
    }

    /// Moves `app` to `final_state` and releases all of its outstanding containers.
    ///
    /// Pending expiry timers are disarmed; no `ContainerExpired` follows for them.
    pub async fn remove_app(
        &self,
        app: &AppId,
        final_state: FinalState,
    ) -> Result<Vec<ContainerId>, TrackerError> {
        let mut book = self.book.lock().await;
        let rec = book
            .apps
            .get_mut(app)
            .ok_or_else(|| TrackerError::UnknownApp { app: app.clone() })?;
        if rec.state.is_terminal() {
            return Err(TrackerError::InactiveApp {
                app: app.clone(),
                state: rec.state,
            });
        }
        let prev = rec.state;
        rec.state = AppState::from(final_state);
        let containers: Vec<ContainerId> = rec.containers.iter().cloned().collect();

        for c in &containers {
            self.release(&mut book, c, ReleaseReason::AppRemoved);
        }
        drop(book);

        let to = AppState::from(final_state);
        info!(%app, from = ?prev, to = ?to, released = containers.len(), "application removed");
        self.bus.publish(
            Notice::new(NoticeKind::AppFinished)
                .with_app(app.clone())
                .with_reason(format!("{to:?}")),
        );
        Ok(containers)
    }

    /// Reclaims an allocation whose deadline elapsed.
    ///
    /// Fails with `ExpiryRace` if the container was launched or released meanwhile, or was
    /// re-armed under a different epoch.
    pub async fn expire(&self, container: &ContainerId, epoch: Epoch) -> Result<Resource, TrackerError> {
        let mut book = self.book.lock().await;
        let pending = book
            .allocations
            .get(container)
            .is_some_and(|a| a.epoch == epoch && !a.launched);
        if !pending {
            return Err(TrackerError::ExpiryRace {
                key: container.to_string(),
                epoch,
            });
        }
        self.release(&mut book, container, ReleaseReason::Expired)
            .map(|a| a.resource)
            .ok_or_else(|| TrackerError::ExpiryRace {
                key: container.to_string(),
                epoch,
            })
    }

    fn reconcile_skipped(&self, node: &NodeId, container: &ContainerId, err: &TrackerError, msg: &str) {
        debug!(%node, %container, error = %err, "{msg}");
        if matches!(err, TrackerError::MisplacedContainer { .. }) {
            self.counters.incr(err.as_label());
        }
    }

    /// Releases every container placed on `node`.
    pub async fn release_node(&self, node: &NodeId, cause: RemovalCause) -> Vec<ContainerId> {
        let reason = match cause {
            RemovalCause::Lost { .. } => ReleaseReason::NodeLost,
            RemovalCause::Decommissioned => ReleaseReason::NodeDecommissioned,
        };
        let mut book = self.book.lock().await;
        let mut on_node: Vec<ContainerId> = book
            .allocations
            .iter()
            .filter(|(_, a)| &a.node == node)
            .map(|(c, _)| c.clone())
            .collect();
        on_node.sort_unstable();

        for c in &on_node {
            self.release(&mut book, c, reason);
        }
        on_node
    }

    pub async fn state(&self, app: &AppId) -> Option<AppState> {
        self.book.lock().await.apps.get(app).map(|r| r.state)
    }

    /// Outstanding containers of `app`, sorted.
    pub async fn containers(&self, app: &AppId) -> Vec<ContainerId> {
        self.book
            .lock()
            .await
            .apps
            .get(app)
            .map(|r| r.containers.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn allocation(&self, container: &ContainerId) -> Option<Allocation> {
        self.book.lock().await.allocations.get(container).cloned()
    }

    /// Number of outstanding allocations across all applications.
    pub async fn outstanding(&self) -> usize {
        self.book.lock().await.allocations.len()
    }

    /// Rejects a node report about a container placed elsewhere or owned by another app.
    fn check_placement(
        alloc: &Allocation,
        container: &ContainerId,
        placement: Option<Placement<'_>>,
    ) -> Result<(), TrackerError> {
        match placement {
            Some(p) if alloc.node != *p.node || alloc.app != *p.app => {
                Err(TrackerError::MisplacedContainer {
                    container: container.clone(),
                    node: p.node.clone(),
                    owner: alloc.node.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    async fn launch(
        &self,
        container: &ContainerId,
        placement: Option<Placement<'_>>,
    ) -> Result<(), TrackerError> {
        let mut book = self.book.lock().await;
        let alloc = book
            .allocations
            .get_mut(container)
            .ok_or_else(|| TrackerError::UnknownContainer {
                container: container.clone(),
            })?;
        Self::check_placement(alloc, container, placement)?;
        if alloc.launched {
            return Ok(());
        }
        alloc.launched = true;
        self.expirer.unregister(container);
        let app = alloc.app.clone();

        if let Some(rec) = book.apps.get_mut(&app) {
            if rec.state == AppState::Accepted {
                rec.state = AppState::Running;
                info!(%app, "application running");
            }
        }
        drop(book);

        debug!(%app, %container, "container launched");
        self.bus.publish(
            Notice::new(NoticeKind::ContainerLaunched)
                .with_app(app)
                .with_container(container.clone()),
        );
        Ok(())
    }

    async fn finish(
        &self,
        container: &ContainerId,
        placement: Option<Placement<'_>>,
    ) -> Result<Resource, TrackerError> {
        let mut book = self.book.lock().await;
        let alloc = book
            .allocations
            .get(container)
            .ok_or_else(|| TrackerError::UnknownContainer {
                container: container.clone(),
            })?;
        Self::check_placement(alloc, container, placement)?;
        self.release(&mut book, container, ReleaseReason::Completed)
            .map(|a| a.resource)
            .ok_or_else(|| TrackerError::UnknownContainer {
                container: container.clone(),
            })
    }

    /// The only place resources go back to the pool.
    fn release(&self, book: &mut Book, container: &ContainerId, reason: ReleaseReason) -> Option<Allocation> {
        let alloc = book.allocations.remove(container)?;
        if let Some(rec) = book.apps.get_mut(&alloc.app) {
            rec.containers.remove(container);
        }
        self.expirer.unregister(container);
        self.pool.credit(alloc.resource);

        let notice = if reason == ReleaseReason::Expired {
            warn!(app = %alloc.app, %container, resource = %alloc.resource, epoch = %alloc.epoch, "container allocation expired");
            self.counters.incr(reason.as_label());
            Notice::new(NoticeKind::ContainerExpired)
        } else {
            debug!(app = %alloc.app, %container, reason = reason.as_label(), "container released");
            Notice::new(NoticeKind::ContainerReleased).with_reason(reason.as_label())
        };
        self.bus.publish(
            notice
                .with_app(alloc.app.clone())
                .with_container(container.clone())
                .with_node(alloc.node.clone())
                .with_resource(alloc.resource),
        );
        Some(alloc)
    }
}

#[async_trait]
impl Reconcile for AppTracker {
    async fn containers_changed(&self, node: &NodeId, delta: &NodeDelta) {
        for (app, c) in &delta.newly_present {
            if let Err(err) = self.launch(c, Some(Placement { node, app })).await {
                self.reconcile_skipped(node, c, &err, "running container not applied");
            }
        }
        for (app, c) in delta.newly_absent.iter().chain(&delta.completed) {
            if let Err(err) = self.finish(c, Some(Placement { node, app })).await {
                self.reconcile_skipped(node, c, &err, "finished container not applied");
            }
        }
    }

    async fn node_removed(&self, node: &NodeId, cause: RemovalCause) {
        let released = self.release_node(node, cause).await;
        if !released.is_empty() {
            info!(%node, released = released.len(), "containers released with node");
        }
    }
}

#[async_trait]
impl Handler for AppTracker {
    async fn handle(&self, env: &Envelope) -> Result<(), HandlerError> {
        let outcome = match &env.event {
            SchedulerEvent::AppAdded { app } => self.add_app(app).await,
            SchedulerEvent::AppRemoved { app, final_state } => {
                self.remove_app(app, *final_state).await.map(|_| ())
            }
            SchedulerEvent::ContainerExpired { container, epoch } => {
                self.expire(container, *epoch).await.map(|_| ())
            }
            SchedulerEvent::NodeAdded { .. }
            | SchedulerEvent::NodeRemoved { .. }
            | SchedulerEvent::NodeUpdate { .. } => Ok(()),
        };
        if let Err(err) = outcome {
            report_rejection(&self.bus, &self.counters, self.name(), env, &err);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "app-tracker"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::FreePool;
    use std::time::{Duration, SystemTime};

    const TOTAL: Resource = Resource::new(8192, 8);
    const SMALL: Resource = Resource::new(1024, 1);

    struct Fixture {
        apps: Arc<AppTracker>,
        pool: Arc<FreePool>,
        expirer: Arc<LivelinessMonitor<ContainerId>>,
        counters: Arc<Counters>,
    }

    fn fixture() -> Fixture {
        let pool = Arc::new(FreePool::new(TOTAL));
        let expirer = Arc::new(LivelinessMonitor::new(
            "alloc",
            Duration::from_secs(30),
            Duration::from_secs(1),
        ));
        let counters = Arc::new(Counters::new());
        let apps = AppTracker::new(
            pool.clone(),
            expirer.clone(),
            Resource::new(4096, 4),
            Bus::new(64),
            counters.clone(),
        );
        Fixture {
            apps,
            pool,
            expirer,
            counters,
        }
    }

    async fn accepted(f: &Fixture, app: &str) -> AppId {
        let id = AppId::from(app);
        f.apps.add_app(&id).await.unwrap();
        f.apps.accept(&id).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_app_lifecycle() {
        let f = fixture();
        let app = AppId::from("app-1");
        f.apps.add_app(&app).await.unwrap();
        assert_eq!(f.apps.state(&app).await, Some(AppState::Submitted));
        assert!(matches!(
            f.apps.add_app(&app).await,
            Err(TrackerError::DuplicateApp { .. })
        ));

        f.apps.accept(&app).await.unwrap();
        assert!(matches!(
            f.apps.accept(&app).await,
            Err(TrackerError::InvalidTransition { .. })
        ));

        f.apps
            .allocate(&app, "c1".into(), "n1".into(), SMALL)
            .await
            .unwrap();
        f.apps.acknowledge(&"c1".into()).await.unwrap();
        assert_eq!(f.apps.state(&app).await, Some(AppState::Running));

        f.apps.remove_app(&app, FinalState::Finished).await.unwrap();
        assert_eq!(f.apps.state(&app).await, Some(AppState::Finished));
        assert!(matches!(
            f.apps.remove_app(&app, FinalState::Killed).await,
            Err(TrackerError::InactiveApp { .. })
        ));

        // A finished id may be submitted again.
        f.apps.add_app(&app).await.unwrap();
    }

    #[tokio::test]
    async fn test_allocation_validation() {
        let f = fixture();
        let app = AppId::from("app-1");
        f.apps.add_app(&app).await.unwrap();
        assert!(matches!(
            f.apps.allocate(&app, "c0".into(), "n1".into(), SMALL).await,
            Err(TrackerError::InvalidTransition { from: AppState::Submitted, .. })
        ));
        f.apps.accept(&app).await.unwrap();

        assert!(matches!(
            f.apps
                .allocate(&app, "c1".into(), "n1".into(), Resource::new(4097, 1))
                .await,
            Err(TrackerError::InvalidResource { .. })
        ));
        f.apps
            .allocate(&app, "c1".into(), "n1".into(), Resource::new(4096, 4))
            .await
            .unwrap();
        assert_eq!(
            f.apps
                .allocate(&app, "c1".into(), "n2".into(), SMALL)
                .await
                .unwrap_err(),
            TrackerError::DuplicateContainer { container: "c1".into() }
        );
        f.apps
            .allocate(&app, "c2".into(), "n1".into(), Resource::new(4096, 4))
            .await
            .unwrap();
        assert_eq!(
            f.apps
                .allocate(&app, "c3".into(), "n1".into(), SMALL)
                .await
                .unwrap_err()
                .as_label(),
            "pool_insufficient"
        );
        assert_eq!(f.pool.available(), Resource::ZERO);
        assert!(matches!(
            f.apps
                .allocate(&"nope".into(), "c4".into(), "n1".into(), SMALL)
                .await,
            Err(TrackerError::UnknownApp { .. })
        ));
    }

    #[tokio::test]
    async fn test_expire_credits_exactly_once() {
        let f = fixture();
        let app = accepted(&f, "app-2").await;
        let epoch = f
            .apps
            .allocate(&app, "c9".into(), "n1".into(), SMALL)
            .await
            .unwrap();
        assert_eq!(f.pool.available(), TOTAL.saturating_sub(SMALL));

        assert_eq!(f.apps.expire(&"c9".into(), epoch).await.unwrap(), SMALL);
        assert_eq!(f.pool.available(), TOTAL);
        assert!(f.apps.containers(&app).await.is_empty());
        assert_eq!(f.counters.get("container_expired"), 1);

        assert!(matches!(
            f.apps.expire(&"c9".into(), epoch).await,
            Err(TrackerError::ExpiryRace { .. })
        ));
        assert!(matches!(
            f.apps.complete(&"c9".into()).await,
            Err(TrackerError::UnknownContainer { .. })
        ));
        assert!(f.apps.remove_app(&app, FinalState::Failed).await.unwrap().is_empty());
        assert_eq!(f.pool.available(), TOTAL);
    }

    #[tokio::test]
    async fn test_acknowledged_container_never_expires() {
        let f = fixture();
        let app = accepted(&f, "app-1").await;
        let epoch = f
            .apps
            .allocate(&app, "c1".into(), "n1".into(), SMALL)
            .await
            .unwrap();
        assert_eq!(f.expirer.epoch_of(&"c1".into()), Some(epoch));

        f.apps.acknowledge(&"c1".into()).await.unwrap();
        f.apps.acknowledge(&"c1".into()).await.unwrap();
        assert_eq!(f.expirer.epoch_of(&"c1".into()), None);

        assert!(matches!(
            f.apps.expire(&"c1".into(), epoch).await,
            Err(TrackerError::ExpiryRace { .. })
        ));
        assert_eq!(f.pool.available(), TOTAL.saturating_sub(SMALL));
        assert!(f.apps.allocation(&"c1".into()).await.unwrap().launched);
    }

    #[tokio::test]
    async fn test_remove_app_disarms_and_credits_once() {
        let f = fixture();
        let app = accepted(&f, "app-2").await;
        let other = accepted(&f, "app-3").await;
        let e9 = f.apps.allocate(&app, "c9".into(), "n1".into(), SMALL).await.unwrap();
        f.apps.allocate(&app, "c8".into(), "n2".into(), SMALL).await.unwrap();
        f.apps.allocate(&other, "c7".into(), "n1".into(), SMALL).await.unwrap();

        let mut released = f.apps.remove_app(&app, FinalState::Killed).await.unwrap();
        released.sort_unstable();
        assert_eq!(released, vec![ContainerId::from("c8"), ContainerId::from("c9")]);
        assert_eq!(f.apps.state(&app).await, Some(AppState::Killed));
        assert_eq!(f.expirer.epoch_of(&"c9".into()), None);
        assert_eq!(f.pool.available(), TOTAL.saturating_sub(SMALL));

        // An expiry that was already in flight is dropped.
        assert!(f.apps.expire(&"c9".into(), e9).await.is_err());
        assert_eq!(f.pool.available(), TOTAL.saturating_sub(SMALL));
        assert_eq!(f.counters.get("container_expired"), 0);
    }

    #[tokio::test]
    async fn test_node_removal_releases_only_its_containers() {
        let f = fixture();
        let app = accepted(&f, "app-1").await;
        f.apps.allocate(&app, "c1".into(), "n1".into(), SMALL).await.unwrap();
        f.apps.allocate(&app, "c2".into(), "n2".into(), SMALL).await.unwrap();
        f.apps.allocate(&app, "c3".into(), "n1".into(), SMALL).await.unwrap();
        f.apps.acknowledge(&"c1".into()).await.unwrap();

        f.apps
            .node_removed(&"n1".into(), RemovalCause::Lost { epoch: Epoch(1) })
            .await;
        assert_eq!(f.apps.containers(&app).await, vec![ContainerId::from("c2")]);
        assert_eq!(f.pool.available(), TOTAL.saturating_sub(SMALL));
        assert_eq!(f.expirer.epoch_of(&"c3".into()), None);

        // Release through the node happened; a later completion cannot credit again.
        assert!(f.apps.complete(&"c1".into()).await.is_err());
        assert_eq!(f.pool.available(), TOTAL.saturating_sub(SMALL));
    }

    #[tokio::test]
    async fn test_reconcile_follows_node_reports() {
        let f = fixture();
        let app = accepted(&f, "app-1").await;
        f.apps.allocate(&app, "c1".into(), "n1".into(), SMALL).await.unwrap();
        f.apps.allocate(&app, "c2".into(), "n1".into(), SMALL).await.unwrap();

        let present = NodeDelta {
            newly_present: vec![(app.clone(), "c1".into()), (app.clone(), "c2".into()), (app.clone(), "stray".into())],
            ..NodeDelta::default()
        };
        f.apps.containers_changed(&"n1".into(), &present).await;
        assert_eq!(f.apps.state(&app).await, Some(AppState::Running));
        assert!(f.expirer.is_empty());

        let gone = NodeDelta {
            newly_absent: vec![(app.clone(), "c1".into())],
            completed: vec![(app.clone(), "c2".into())],
            ..NodeDelta::default()
        };
        f.apps.containers_changed(&"n1".into(), &gone).await;
        assert!(f.apps.containers(&app).await.is_empty());
        assert_eq!(f.pool.available(), TOTAL);
    }

    #[tokio::test]
    async fn test_report_from_other_node_leaves_allocation() {
        let f = fixture();
        let app = accepted(&f, "app-2").await;
        let epoch = f
            .apps
            .allocate(&app, "c1".into(), "n1".into(), SMALL)
            .await
            .unwrap();

        let foreign = NodeDelta {
            newly_present: vec![(app.clone(), "c1".into())],
            completed: vec![(app.clone(), "c1".into())],
            ..NodeDelta::default()
        };
        f.apps.containers_changed(&"n2".into(), &foreign).await;

        let alloc = f.apps.allocation(&"c1".into()).await.unwrap();
        assert!(!alloc.launched);
        assert_eq!(f.expirer.epoch_of(&"c1".into()), Some(epoch));
        assert_eq!(f.pool.available(), TOTAL.saturating_sub(SMALL));
        assert_eq!(f.apps.state(&app).await, Some(AppState::Accepted));
        assert_eq!(f.counters.get("misplaced_container"), 2);

        // Right node, wrong application.
        let wrong_app = NodeDelta {
            completed: vec![(AppId::from("app-9"), "c1".into())],
            ..NodeDelta::default()
        };
        f.apps.containers_changed(&"n1".into(), &wrong_app).await;
        assert!(f.apps.allocation(&"c1".into()).await.is_some());

        let owner = NodeDelta {
            completed: vec![(app.clone(), "c1".into())],
            ..NodeDelta::default()
        };
        f.apps.containers_changed(&"n1".into(), &owner).await;
        assert!(f.apps.allocation(&"c1".into()).await.is_none());
        assert_eq!(f.pool.available(), TOTAL);
    }

    #[tokio::test]
    async fn test_handler_counts_rejections() {
        let f = fixture();
        let env = |seq, event| Envelope {
            seq,
            at: SystemTime::now(),
            event,
        };
        f.apps.handle(&env(1, SchedulerEvent::app_added("a1"))).await.unwrap();
        f.apps.handle(&env(2, SchedulerEvent::app_added("a1"))).await.unwrap();
        f.apps
            .handle(&env(3, SchedulerEvent::app_removed("ghost", FinalState::Killed)))
            .await
            .unwrap();
        f.apps
            .handle(&env(4, SchedulerEvent::container_expired("c1", Epoch(1))))
            .await
            .unwrap();

        assert_eq!(f.apps.state(&"a1".into()).await, Some(AppState::Submitted));
        assert_eq!(f.counters.get("duplicate_app"), 1);
        assert_eq!(f.counters.get("unknown_app"), 1);
        assert_eq!(f.counters.get("expiry_race"), 1);
    }
}
