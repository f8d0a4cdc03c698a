use std::sync::Arc;
use std::time::SystemTime;

/// Health report produced by a node's own health checker.
///
/// Constructed once by the reporting side and consumed read-only by the node tracker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeHealthStatus {
    healthy: bool,
    report: Option<Arc<str>>,
    reported_at: SystemTime,
}

impl NodeHealthStatus {
    pub fn new(healthy: bool, report: Option<Arc<str>>, reported_at: SystemTime) -> Self {
        Self {
            healthy,
            report,
            reported_at,
        }
    }

    /// Healthy status stamped with the current wall-clock time.
    pub fn healthy() -> Self {
        Self::new(true, None, SystemTime::now())
    }

    /// Unhealthy status with a diagnostic message, stamped now.
    pub fn unhealthy(report: impl Into<Arc<str>>) -> Self {
        Self::new(false, Some(report.into()), SystemTime::now())
    }

    #[inline]
    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    /// Diagnostic message, if the node attached one.
    #[inline]
    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    #[inline]
    pub fn reported_at(&self) -> SystemTime {
        self.reported_at
    }
}
