//! Application and container lifecycle tracking.
//!
//! - [`AppTracker`]: handler for `AppAdded`, `AppRemoved` and `ContainerExpired`, and the
//!   [`Reconcile`](crate::Reconcile) target of the node tracker
//! - [`AppState`], [`Allocation`], [`ReleaseReason`]: per-application and per-container state
//! - [`AppIdGenerator`], [`NewApplication`]: application id allocation

mod ids;
mod state;
mod tracker;

pub use ids::{AppIdGenerator, NewApplication};
pub use state::{Allocation, AppState, ReleaseReason};
pub use tracker::AppTracker;
