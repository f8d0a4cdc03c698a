//! # rmvisor
//!
//! **rmvisor** is the event core of a heartbeat-driven cluster resource manager.
//!
//! Nodes report heartbeats carrying container status and health, applications are
//! added and removed, containers allocated but never launched expire. Every one of
//! these facts flows as a typed [`SchedulerEvent`] through a single ordered dispatch
//! loop to the components tracking node and application state, and on to a scheduler
//! registered as a [`Handler`].
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  heartbeat transport    submission client    administrator
//!     NodeUpdate            AppAdded/Removed     NodeAdded/Removed
//!          └───────────────────┬─────────────────────┘
//!                              ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  ResourceManager                                                  │
//! │  - Dispatcher (unbounded FIFO, one loop, fan-out per EventKind)   │
//! │  - heartbeat monitor ──► NodeRemoved{Lost{epoch}}                 │
//! │  - allocation expirer ─► ContainerExpired{epoch}                  │
//! │  - ResourcePool (credit/debit)                                    │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//!  │ NodeTracker │──►│ AppTracker  │   │  scheduler  │
//!  │ (Reconcile) │   │             │   │  (Handler)  │
//!  └──────┬──────┘   └──────┬──────┘   └─────────────┘
//!         │ Publishes       │ Publishes
//!         │ Notices:        │ Notices:
//!         │ - NodeRunning   │ - ContainerAllocated
//!         │ - NodeLost      │ - ContainerExpired
//!         │ - ...           │ - ...
//!         ▼                 ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! │                   (capacity: Config::bus_capacity)                │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                         SubscriberSet (per-sub queues)
//!                          ┌────────┼────────┐
//!                          ▼        ▼        ▼
//!                      LogWriter  metrics  custom
//! ```
//!
//! ### Node lifecycle
//! ```text
//! NodeAdded ──► New ──healthy──► Running ⇄ Unhealthy
//!                │                  │          │
//!                └──────────────────┴──────────┴──► Lost (heartbeat expiry)
//!                                                └► Decommissioned (NodeRemoved)
//! ```
//!
//! ## Features
//! | Area               | Description                                                   | Key types / traits                          |
//! |--------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Dispatch**       | Ordered fan-out of scheduler events, fault isolation.         | [`Dispatcher`], [`Handler`]                 |
//! | **Nodes**          | Heartbeat ingestion, health states, loss detection.           | [`NodeTracker`], [`NodeState`]              |
//! | **Applications**   | App states, container allocation, launch, expiry.             | [`AppTracker`], [`AppState`]                |
//! | **Timers**         | Epoch-tagged deadline watchdog.                               | [`LivelinessMonitor`]                       |
//! | **Accounting**     | Credit/debit of cluster capacity.                             | [`ResourcePool`], [`FreePool`]              |
//! | **Subscriber API** | Monitoring notices (logging, metrics, alerting).              | [`Subscribe`], [`Notice`]                   |
//! | **Errors**         | Typed errors with stable labels.                              | [`TrackerError`], [`RuntimeError`]          |
//! | **Configuration**  | Centralized runtime settings.                                 | [`Config`]                                  |
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use rmvisor::{Config, LogWriter, ResourceManager, Resource, SchedulerEvent, Subscribe};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
//!     let rm = ResourceManager::builder(Config::default())
//!         .with_subscribers(subs)
//!         .build()?;
//!     rm.start()?;
//!
//!     let app = rm.new_application().app_id;
//!     rm.dispatch(SchedulerEvent::node_added("node-1"))?;
//!     rm.dispatch(SchedulerEvent::app_added(app.clone()))?;
//!     rm.drained().await?;
//!
//!     rm.apps().accept(&app).await?;
//!     rm.apps()
//!         .allocate(&app, "container_1".into(), "node-1".into(), Resource::new(1024, 1))
//!         .await?;
//!
//!     rm.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod apps;
mod config;
mod core;
mod counters;
mod dispatch;
mod error;
mod events;
mod model;
mod monitor;
mod nodes;
mod pool;
mod subscribers;

pub mod telemetry;

// ---- Public re-exports ----

pub use crate::core::{ResourceManager, ResourceManagerBuilder};
pub use apps::{Allocation, AppIdGenerator, AppState, AppTracker, NewApplication, ReleaseReason};
pub use config::Config;
pub use counters::Counters;
pub use dispatch::{DispatchHandle, Dispatcher, Handler};
pub use error::{DispatchError, HandlerError, PoolError, RuntimeError, TrackerError};
pub use events::{
    Bus, Envelope, EventKey, EventKind, FinalState, Notice, NoticeKind, RemovalCause,
    SchedulerEvent,
};
pub use model::{
    AppId, ContainerId, ContainerState, ContainerStatus, Epoch, NodeHealthStatus, NodeId,
    NodeStatusEvent, Resource, ResponseId,
};
pub use monitor::LivelinessMonitor;
pub use nodes::{NodeDelta, NodeReport, NodeState, NodeTracker, Reconcile};
pub use pool::{FreePool, ResourcePool};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
