//! # Notice subscribers.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out and the
//! built-in [`LogWriter`].
//!
//! ```text
//! Tracker / Dispatcher ── publish(Notice) ──► Bus ──► ResourceManager listener
//!                                                          │
//!                                                  SubscriberSet::emit
//!                                              ┌───────────┼───────────┐
//!                                              ▼           ▼           ▼
//!                                          LogWriter    Metrics     Custom
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use rmvisor::{Notice, NoticeKind, Subscribe};
//! use async_trait::async_trait;
//!
//! struct ExpiryAlerts;
//!
//! #[async_trait]
//! impl Subscribe for ExpiryAlerts {
//!     async fn on_notice(&self, notice: &Notice) {
//!         if notice.kind == NoticeKind::ContainerExpired {
//!             // page someone
//!         }
//!     }
//!     fn name(&self) -> &'static str { "expiry-alerts" }
//! }
//! ```

mod log;
mod subscribe;
mod subscriber_set;

pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
