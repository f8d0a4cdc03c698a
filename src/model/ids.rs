//! # Identifiers for nodes, applications, containers and timer generations.
//!
//! Node, application and container ids are cheap-to-clone string newtypes
//! (`Arc<str>` inside), so they can be used as map keys and carried by events
//! without copying the underlying text.
//!
//! [`Epoch`] and [`ResponseId`] are plain counters:
//! - `Epoch` invalidates a pending liveliness timer after the entity it was armed for
//!   has been released or re-registered.
//! - `ResponseId` is the heartbeat acknowledgment token a node echoes back; it must grow.

use std::fmt;
use std::sync::Arc;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Creates an identifier from any string-like value.
            pub fn new(id: impl Into<Arc<str>>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }
    };
}

string_id! {
    /// Identity of a worker node (usually `host:port`).
    NodeId
}

string_id! {
    /// Identity of an application.
    AppId
}

string_id! {
    /// Identity of a container allocated to an application.
    ContainerId
}

/// Generation of a liveliness registration.
///
/// Every registration of a key in a [`LivelinessMonitor`](crate::LivelinessMonitor)
/// gets a fresh, strictly larger epoch. An expiry carrying an older epoch is stale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epoch(pub u64);

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Heartbeat acknowledgment token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResponseId(pub u64);

impl fmt::Display for ResponseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_ids_order_and_display() {
        let set: BTreeSet<ContainerId> = ["c2", "c1", "c3"].into_iter().map(ContainerId::from).collect();
        let ordered: Vec<&str> = set.iter().map(ContainerId::as_str).collect();
        assert_eq!(ordered, vec!["c1", "c2", "c3"]);
        assert_eq!(NodeId::from("node-1:8041").to_string(), "node-1:8041");
    }

    #[test]
    fn test_epoch_and_token_compare() {
        assert!(Epoch(2) > Epoch(1));
        assert!(ResponseId(5) <= ResponseId(5));
        assert_eq!(Epoch(7).to_string(), "e7");
    }
}
