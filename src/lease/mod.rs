//! Lease-based coordination for per-location refresh work
//!
//! A lease is a time-bounded, class-tagged exclusive claim on a resource
//! key, stored centrally. The manager layers priority preemption and TTL
//! expiry on top of the store's atomic conditional update.

pub mod manager;
pub mod postgres;
pub mod store;

pub use manager::{LeaseInfo, LeaseManager};
pub use postgres::PostgresLeaseStore;
pub use store::{
    LeaseCondition, LeaseRecord, LeaseStore, LeaseWrite, MemoryLeaseStore, StoreError,
    UpdateOutcome,
};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of actor owning (or requesting) a lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HolderClass {
    /// On-demand request from a user-facing caller.
    Interactive,
    /// The periodic full-catalog refresh process.
    Scheduled,
    /// One of the N sharded background workers.
    ShardWorker,
}

impl HolderClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interactive => "interactive",
            Self::Scheduled => "scheduled",
            Self::ShardWorker => "shard-worker",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "interactive" => Some(Self::Interactive),
            "scheduled" => Some(Self::Scheduled),
            "shard-worker" => Some(Self::ShardWorker),
            _ => None,
        }
    }

    /// Classes whose held (unexpired) lease this class may take over.
    ///
    /// Interactive work preempts both background classes. Scheduled and
    /// shard-worker holders are mutually non-preempting equals; they only
    /// ever take free or expired leases.
    pub fn preempts(&self) -> &'static [HolderClass] {
        match self {
            Self::Interactive => &[Self::Scheduled, Self::ShardWorker],
            Self::Scheduled | Self::ShardWorker => &[],
        }
    }

    pub fn can_preempt(&self, holding: HolderClass) -> bool {
        self.preempts().contains(&holding)
    }

    pub fn all() -> [HolderClass; 3] {
        [Self::Interactive, Self::Scheduled, Self::ShardWorker]
    }
}

impl fmt::Display for HolderClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_holder_class_round_trip() {
        for class in HolderClass::all() {
            assert_eq!(HolderClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(HolderClass::parse("on-demand"), None);
    }

    #[test]
    fn test_preemption_matrix() {
        use HolderClass::*;

        assert!(Interactive.can_preempt(Scheduled));
        assert!(Interactive.can_preempt(ShardWorker));
        assert!(!Interactive.can_preempt(Interactive));

        assert!(!Scheduled.can_preempt(Interactive));
        assert!(!Scheduled.can_preempt(ShardWorker));
        assert!(!Scheduled.can_preempt(Scheduled));

        assert!(!ShardWorker.can_preempt(Interactive));
        assert!(!ShardWorker.can_preempt(Scheduled));
        assert!(!ShardWorker.can_preempt(ShardWorker));
    }
}
