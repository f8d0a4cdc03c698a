//! Event dispatch: the [`Dispatcher`] loop and the [`Handler`] trait.

mod dispatcher;
mod handler;

pub use dispatcher::{DispatchHandle, Dispatcher};
pub use handler::Handler;

use std::any::Any;

use tracing::{debug, warn};

use crate::counters::Counters;
use crate::error::TrackerError;
use crate::events::{Bus, Envelope, EventKey, Notice, NoticeKind};

/// Records a tracker's refusal of an event: log, count, publish `EventRejected`.
///
/// Expected rejections (replays, timer races) are logged at `debug`.
pub(crate) fn report_rejection(
    bus: &Bus,
    counters: &Counters,
    tracker: &'static str,
    env: &Envelope,
    err: &TrackerError,
) {
    let kind = env.event.kind().as_label();
    let key = env.event.key();
    if err.is_expected() {
        debug!(seq = env.seq, kind, %key, tracker, error = %err, "event dropped");
    } else {
        warn!(seq = env.seq, kind, %key, tracker, error = %err, "event rejected");
    }
    counters.incr(err.as_label());

    let notice = Notice::new(NoticeKind::EventRejected)
        .with_handler(tracker)
        .with_reason(err.as_label());
    let notice = match key {
        EventKey::Node(id) => notice.with_node(id.clone()),
        EventKey::App(id) => notice.with_app(id.clone()),
        EventKey::Container(id) => notice.with_container(id.clone()),
    };
    bus.publish(notice);
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
