//! Events: scheduler events, monitoring notices and the notice bus.
//!
//! ## Contents
//! - [`SchedulerEvent`], [`EventKind`], [`Envelope`]: the closed event model routed by the
//!   [`Dispatcher`](crate::Dispatcher)
//! - [`Notice`], [`NoticeKind`]: monitoring records describing what the core did
//! - [`Bus`]: broadcast channel carrying notices to subscribers
//!
//! ## Quick reference
//! - **Event producers**: heartbeat transport, submission handler, administrator,
//!   heartbeat monitor, allocation expirer.
//! - **Event consumers**: `NodeTracker`, `AppTracker`, any registered scheduler handler.
//! - **Notice publishers**: trackers, dispatcher loop, subscriber workers.
//! - **Notice consumers**: `ResourceManager` listener → `SubscriberSet`.

mod bus;
mod event;
mod notice;

pub use bus::Bus;
pub use event::{Envelope, EventKey, EventKind, FinalState, RemovalCause, SchedulerEvent};
pub use notice::{Notice, NoticeKind};
