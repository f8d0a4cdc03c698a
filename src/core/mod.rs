//! Runtime core: wiring and lifecycle.
//!
//! The only public API from this module is [`ResourceManager`] and its builder.
//!
//! Internal modules:
//! - [`builder`]: constructs every component once and threads the handles explicitly;
//! - [`manager`]: owns the background workers, start and graceful shutdown;
//! - [`shutdown`]: cross-platform termination signal handling.

mod builder;
mod manager;
mod shutdown;

pub use builder::ResourceManagerBuilder;
pub use manager::ResourceManager;
