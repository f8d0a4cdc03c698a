use crate::events::FinalState;
use crate::model::{AppId, Epoch, NodeId, Resource};

/// Lifecycle state of a tracked application.
///
/// ```text
/// AppAdded ──► Submitted ──accept──► Accepted ──first launch──► Running
///                  │                     │                         │
///                  └─────────────────────┴──── AppRemoved ─────────┴──► Finished | Failed | Killed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppState {
    Submitted,
    Accepted,
    Running,
    Finished,
    Failed,
    Killed,
}

impl AppState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppState::Finished | AppState::Failed | AppState::Killed)
    }

    /// Whether containers may be allocated to an application in this state.
    #[inline]
    pub fn can_allocate(&self) -> bool {
        matches!(self, AppState::Accepted | AppState::Running)
    }
}

impl From<FinalState> for AppState {
    fn from(f: FinalState) -> Self {
        match f {
            FinalState::Finished => AppState::Finished,
            FinalState::Failed => AppState::Failed,
            FinalState::Killed => AppState::Killed,
        }
    }
}

/// A container handed out to an application and not yet released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub app: AppId,
    pub node: NodeId,
    pub resource: Resource,
    /// Allocation expirer registration; matched against `ContainerExpired`.
    pub epoch: Epoch,
    /// Set once the application acknowledged (launched) the container.
    pub launched: bool,
}

/// Path through which a container's resources went back to the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    Completed,
    AppRemoved,
    NodeLost,
    NodeDecommissioned,
    Expired,
}

impl ReleaseReason {
    pub fn as_label(&self) -> &'static str {
        match self {
            ReleaseReason::Completed => "completed",
            ReleaseReason::AppRemoved => "app_removed",
            ReleaseReason::NodeLost => "node_lost",
            ReleaseReason::NodeDecommissioned => "node_decommissioned",
            ReleaseReason::Expired => "container_expired",
        }
    }
}
