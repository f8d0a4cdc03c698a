//! # Dispatcher: ordered, fan-out delivery of scheduler events.
//!
//! ## Architecture
//! ```text
//! Producers (many):                         Dispatch loop (one):
//!   heartbeat ingest ──┐
//!   submission       ──┼── dispatch(ev) ──► [unbounded queue] ──► seq += 1
//!   heartbeat monitor──┤   (never waits)                            │
//!   alloc expirer    ──┘                              handlers[ev.kind()] in order
//!                                                       ├─► h1.handle(&env).await
//!                                                       ├─► h2.handle(&env).await
//!                                                       └─► ...
//! ```
//!
//! ## Rules
//! - **Global FIFO**: events are handled one at a time in submission order, across all kinds.
//! - **Fan-out**: any number of distinct handlers per kind, called in registration order.
//! - **Isolation**: a failing or panicking handler is logged, counted and reported as a
//!   notice; the remaining handlers still run and the loop never exits because of it.
//! - **Drain on stop**: after cancellation, events already queued are still delivered.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{Handler, panic_message};
use crate::counters::Counters;
use crate::error::{DispatchError, HandlerError};
use crate::events::{Bus, Envelope, EventKind, Notice, NoticeKind, SchedulerEvent};

enum Command {
    Event(SchedulerEvent),
    /// Answered once every command queued before it has been processed.
    Barrier(oneshot::Sender<()>),
}

/// Cloneable submission side of a [`Dispatcher`].
///
/// Given to every producer (trackers, monitors, transport) instead of the dispatcher itself.
#[derive(Clone)]
pub struct DispatchHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl DispatchHandle {
    /// Enqueues an event. Returns immediately.
    pub fn dispatch(&self, event: SchedulerEvent) -> Result<(), DispatchError> {
        self.tx
            .send(Command::Event(event))
            .map_err(|_| DispatchError::Closed)
    }

    /// Waits until every event dispatched before this call has been handled.
    pub async fn drained(&self) -> Result<(), DispatchError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Command::Barrier(tx))
            .map_err(|_| DispatchError::Closed)?;
        rx.await.map_err(|_| DispatchError::Closed)
    }
}

/// Routes each [`SchedulerEvent`] to every handler registered for its kind.
pub struct Dispatcher {
    handlers: RwLock<HashMap<EventKind, Vec<Arc<dyn Handler>>>>,
    handle: DispatchHandle,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
    bus: Bus,
    counters: Arc<Counters>,
}

impl Dispatcher {
    pub fn new(bus: Bus, counters: Arc<Counters>) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            handlers: RwLock::new(HashMap::new()),
            handle: DispatchHandle { tx },
            rx: Mutex::new(Some(rx)),
            bus,
            counters,
        })
    }

    /// Returns a submission handle.
    pub fn handle(&self) -> DispatchHandle {
        self.handle.clone()
    }

    /// Adds `handler` to the fan-out list of `kind`.
    ///
    /// Fails if this very instance is already registered for `kind`.
    pub fn register(&self, kind: EventKind, handler: Arc<dyn Handler>) -> Result<(), DispatchError> {
        let mut handlers = self.handlers.write();
        let list = handlers.entry(kind).or_default();

        let ptr = Arc::as_ptr(&handler) as *const ();
        if list.iter().any(|h| Arc::as_ptr(h) as *const () == ptr) {
            return Err(DispatchError::DuplicateHandler {
                kind,
                handler: handler.name(),
            });
        }
        debug!(kind = kind.as_label(), handler = handler.name(), "handler registered");
        list.push(handler);
        Ok(())
    }

    /// Registers one handler for several kinds.
    pub fn register_all(
        &self,
        kinds: &[EventKind],
        handler: Arc<dyn Handler>,
    ) -> Result<(), DispatchError> {
        for kind in kinds {
            self.register(*kind, Arc::clone(&handler))?;
        }
        Ok(())
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.read().get(&kind).map_or(0, Vec::len)
    }

    /// Shorthand for `self.handle().dispatch(event)`.
    pub fn dispatch(&self, event: SchedulerEvent) -> Result<(), DispatchError> {
        self.handle.dispatch(event)
    }

    /// Runs the dispatch loop until `token` is cancelled, then drains the queue.
    ///
    /// Can be started once per dispatcher.
    pub async fn run(self: Arc<Self>, token: CancellationToken) -> Result<(), DispatchError> {
        let mut rx = self.rx.lock().take().ok_or(DispatchError::AlreadyRunning)?;
        let mut seq: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                cmd = rx.recv() => match cmd {
                    Some(cmd) => self.process(cmd, &mut seq).await,
                    None => break,
                }
            }
        }

        rx.close();
        while let Some(cmd) = rx.recv().await {
            self.process(cmd, &mut seq).await;
        }
        debug!(processed = seq, "dispatch loop stopped");
        Ok(())
    }

    async fn process(&self, cmd: Command, seq: &mut u64) {
        match cmd {
            Command::Event(event) => {
                *seq += 1;
                let env = Envelope {
                    seq: *seq,
                    at: SystemTime::now(),
                    event,
                };
                self.deliver(&env).await;
            }
            Command::Barrier(done) => {
                let _ = done.send(());
            }
        }
    }

    async fn deliver(&self, env: &Envelope) {
        let kind = env.event.kind();
        let handlers: Vec<Arc<dyn Handler>> = self
            .handlers
            .read()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(seq = env.seq, kind = kind.as_label(), "no handler for event");
            return;
        }

        for h in handlers {
            let fut = h.handle(env);
            match std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(
                        seq = env.seq,
                        kind = kind.as_label(),
                        key = %env.event.key(),
                        handler = h.name(),
                        error = %err,
                        "handler failed"
                    );
                    self.counters.incr("handler_failed");
                    if let HandlerError::Tracker(cause) = &err {
                        self.counters.incr(cause.as_label());
                    }
                    self.bus.publish(
                        Notice::new(NoticeKind::HandlerFailed)
                            .with_handler(h.name())
                            .with_reason(err.to_string()),
                    );
                }
                Err(panic) => {
                    let info = panic_message(&*panic);
                    error!(
                        seq = env.seq,
                        kind = kind.as_label(),
                        key = %env.event.key(),
                        handler = h.name(),
                        %info,
                        "handler panicked"
                    );
                    self.counters.incr("handler_panicked");
                    self.bus.publish(
                        Notice::new(NoticeKind::HandlerPanicked)
                            .with_handler(h.name())
                            .with_reason(info),
                    );
                }
            }
        }
    }
}
