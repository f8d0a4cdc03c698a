//! Node lifecycle tracking.
//!
//! - [`NodeTracker`]: handler for `NodeAdded`, `NodeRemoved` and `NodeUpdate`
//! - [`NodeState`], [`NodeReport`]: per-node state and snapshots
//! - [`NodeDelta`], [`Reconcile`]: what a heartbeat changed and who is told about it

mod state;
mod tracker;

pub use state::{NodeReport, NodeState};
pub use tracker::{NodeDelta, NodeTracker, Reconcile};
