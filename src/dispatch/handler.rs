use async_trait::async_trait;

use crate::error::HandlerError;
use crate::events::Envelope;

/// Consumer of scheduler events.
///
/// Handlers run on the dispatch loop, one event at a time, in registration
/// order. A handler must not wait for events it dispatches itself: they are only
/// delivered after the current event has been handled by everyone.
///
/// # Example
/// ```rust
/// use async_trait::async_trait;
/// use rmvisor::{Envelope, Handler, HandlerError, SchedulerEvent};
///
/// struct Placement;
///
/// #[async_trait]
/// impl Handler for Placement {
///     async fn handle(&self, env: &Envelope) -> Result<(), HandlerError> {
///         if let SchedulerEvent::NodeUpdate { status } = &env.event {
///             let _ = status.node_id(); // consider the node for placement
///         }
///         Ok(())
///     }
///     fn name(&self) -> &'static str { "placement" }
/// }
/// ```
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, envelope: &Envelope) -> Result<(), HandlerError>;

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
