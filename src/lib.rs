//! marquee - Movie Showtime Aggregation Coordinator
//!
//! The coordination layer for a per-location movie listing aggregator:
//! keeps movies/theaters/showtimes fresh under concurrent interactive
//! requests, a scheduled refresh process and a fleet of sharded
//! background workers.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and policy constants
//! - [`lease`] - Lease manager with priority preemption over a store
//! - [`shard`] - Deterministic shard assignment for worker fleets
//! - [`coverage`] - Incremental coverage planning
//! - [`merge`] - Idempotent merge/reconciliation engine
//! - [`orchestrator`] - Refresh pipeline and the three actor wrappers
//! - [`acquire`] - The external acquirer seam
//! - [`storage`] - Persisted listing state (PostgreSQL, in-memory)
//! - [`models`] - Core data structures and types
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use marquee::config::Config;
//! use marquee::lease::{LeaseManager, MemoryLeaseStore};
//! use marquee::orchestrator::Coordinator;
//! use marquee::storage::MemoryListingStore;
//!
//! # fn acquirer() -> Arc<dyn marquee::acquire::Acquirer> { unimplemented!() }
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let leases = Arc::new(LeaseManager::new(
//!     Arc::new(MemoryLeaseStore::new()),
//!     config.coordination.lease_ttl(),
//! ));
//! let coordinator = Coordinator::new(
//!     leases,
//!     Arc::new(MemoryListingStore::new()),
//!     acquirer(),
//!     config.coordination,
//! );
//! # Ok(())
//! # }
//! ```

pub mod acquire;
pub mod commands;
pub mod config;
pub mod coverage;
pub mod error;
pub mod lease;
pub mod merge;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod shard;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::acquire::{AcquireError, Acquirer, Acquisition};
    pub use crate::config::Config;
    pub use crate::coverage::CoveragePlanner;
    pub use crate::error::{Error, ErrorCategory, MarqueeError, Result};
    pub use crate::lease::{HolderClass, LeaseManager, LeaseStore};
    pub use crate::merge::{MergeEngine, MergePolicy};
    pub use crate::models::{FetchRange, Movie, ResourceKey, Showtime, Theater};
    pub use crate::orchestrator::{Coordinator, RunOutcome};
    pub use crate::shard::ShardRouter;
    pub use crate::storage::ListingStore;
}

// Direct re-exports for convenience
pub use models::{FetchRange, Movie, ResourceKey, Showtime, Theater};
