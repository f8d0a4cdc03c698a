//! Data model shared by the dispatcher and the trackers.
//!
//! ## Contents
//! - [`NodeId`], [`AppId`], [`ContainerId`]: entity identifiers
//! - [`Epoch`], [`ResponseId`]: timer generation and heartbeat token
//! - [`Resource`]: memory/vcore amounts
//! - [`NodeHealthStatus`], [`ContainerStatus`], [`NodeStatusEvent`]: heartbeat payload

mod health;
mod ids;
mod resource;
mod status;

pub use health::NodeHealthStatus;
pub use ids::{AppId, ContainerId, Epoch, NodeId, ResponseId};
pub use resource::Resource;
pub use status::{ContainerState, ContainerStatus, NodeStatusEvent};
