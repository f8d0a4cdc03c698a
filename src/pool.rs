//! # Cluster resource pool.
//!
//! The trackers treat resource accounting as an opaque counter service behind
//! [`ResourcePool`]: allocation debits, every release path credits exactly once.
//! [`FreePool`] is the in-process implementation.

use parking_lot::Mutex;

use crate::error::PoolError;
use crate::model::Resource;

/// Credit/debit accounting of free cluster capacity.
pub trait ResourcePool: Send + Sync + 'static {
    /// Returns capacity to the free pool.
    fn credit(&self, resource: Resource);

    /// Takes capacity from the free pool, failing if it does not fit.
    fn debit(&self, resource: Resource) -> Result<(), PoolError>;

    /// Currently free capacity.
    fn available(&self) -> Resource;
}

/// Fixed-capacity pool. Credits never push `available` above `total`.
#[derive(Debug)]
pub struct FreePool {
    total: Resource,
    free: Mutex<Resource>,
}

impl FreePool {
    pub fn new(total: Resource) -> Self {
        Self {
            total,
            free: Mutex::new(total),
        }
    }

    pub fn total(&self) -> Resource {
        self.total
    }

    /// Capacity currently handed out.
    pub fn used(&self) -> Resource {
        self.total.saturating_sub(*self.free.lock())
    }
}

impl ResourcePool for FreePool {
    fn credit(&self, resource: Resource) {
        let mut free = self.free.lock();
        let next = free.saturating_add(resource);
        *free = Resource::new(
            next.memory_mb.min(self.total.memory_mb),
            next.vcores.min(self.total.vcores),
        );
    }

    fn debit(&self, resource: Resource) -> Result<(), PoolError> {
        let mut free = self.free.lock();
        if !resource.fits_in(&free) {
            return Err(PoolError::Insufficient {
                requested: resource,
                available: *free,
            });
        }
        *free = free.saturating_sub(resource);
        Ok(())
    }

    fn available(&self) -> Resource {
        *self.free.lock()
    }
}
