//! # Notice subscriber trait
//!
//! `Subscribe` is the extension point for plugging monitoring sinks into the
//! resource manager. Each subscriber is driven by a dedicated worker fed by a
//! bounded queue owned by the [`SubscriberSet`](crate::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching); they never block the
//!   dispatch loop nor other subscribers.
//! - On queue overflow notices for that subscriber are **dropped** and a
//!   `SubscriberOverflow` notice is published.

use async_trait::async_trait;

use crate::events::Notice;

/// Contract for notice subscribers.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single notice.
    async fn on_notice(&self, notice: &Notice);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
