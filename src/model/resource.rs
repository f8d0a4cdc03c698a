use std::fmt;

/// Bounded amount of cluster capacity (memory and virtual cores).
///
/// Arithmetic saturates: the pool and the trackers never observe negative or wrapped values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Resource {
    /// Memory in megabytes.
    pub memory_mb: u64,
    /// Virtual cores.
    pub vcores: u32,
}

impl Resource {
    /// No capacity.
    pub const ZERO: Resource = Resource {
        memory_mb: 0,
        vcores: 0,
    };

    pub const fn new(memory_mb: u64, vcores: u32) -> Self {
        Self { memory_mb, vcores }
    }

    #[inline]
    pub fn saturating_add(self, other: Resource) -> Resource {
        Resource {
            memory_mb: self.memory_mb.saturating_add(other.memory_mb),
            vcores: self.vcores.saturating_add(other.vcores),
        }
    }

    #[inline]
    pub fn saturating_sub(self, other: Resource) -> Resource {
        Resource {
            memory_mb: self.memory_mb.saturating_sub(other.memory_mb),
            vcores: self.vcores.saturating_sub(other.vcores),
        }
    }

    /// Returns true if every dimension of `self` is within `limit`.
    #[inline]
    pub fn fits_in(&self, limit: &Resource) -> bool {
        self.memory_mb <= limit.memory_mb && self.vcores <= limit.vcores
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        *self == Resource::ZERO
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<memory:{}MB, vcores:{}>", self.memory_mb, self.vcores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_saturating_math() {
        let a = Resource::new(1024, 2);
        let b = Resource::new(2048, 1);
        assert_eq!(a.saturating_add(b), Resource::new(3072, 3));
        assert_eq!(a.saturating_sub(b), Resource::new(0, 1));
    }

    #[test]
    fn test_fits_in() {
        let max = Resource::new(8192, 4);
        assert!(Resource::new(8192, 4).fits_in(&max));
        assert!(!Resource::new(8193, 1).fits_in(&max));
        assert!(!Resource::new(1, 5).fits_in(&max));
    }
}
