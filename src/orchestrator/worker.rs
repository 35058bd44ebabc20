//! Batch refresh runners
//!
//! The shard worker processes the subset of the catalog its shard id owns;
//! the scheduled refresh walks the whole catalog. Both run the shared
//! pipeline key by key and keep going when an individual key fails; only
//! a store error aborts the batch.

use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::{Coordinator, RunOutcome};
use crate::lease::store::StoreError;
use crate::lease::HolderClass;
use crate::shard::{ShardId, ShardRouter};

/// Per-batch tallies, logged at cycle end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn record(&mut self, outcome: &RunOutcome) {
        self.total += 1;
        match outcome {
            RunOutcome::Completed { .. } => self.succeeded += 1,
            RunOutcome::Failed(_) => self.failed += 1,
            _ => self.skipped += 1,
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} processed: {} succeeded, {} skipped, {} failed",
            self.total, self.succeeded, self.skipped, self.failed
        )
    }
}

/// One of N background workers that together cover the catalog per cycle.
pub struct ShardWorker {
    coordinator: Arc<Coordinator>,
    router: ShardRouter,
    shard_id: ShardId,
}

impl ShardWorker {
    pub fn new(coordinator: Arc<Coordinator>, shard_id: ShardId, total_shards: u32) -> Self {
        Self {
            coordinator,
            router: ShardRouter::new(total_shards),
            shard_id,
        }
    }

    /// Process this shard's key subset once.
    pub async fn run(&self) -> Result<BatchSummary, StoreError> {
        let catalog = self.coordinator.listings().list_keys().await?;
        let assigned = self.router.filter_catalog(&catalog, self.shard_id);

        info!(
            shard_id = self.shard_id,
            total_shards = self.router.total_shards(),
            assigned = assigned.len(),
            catalog = catalog.len(),
            "shard worker starting"
        );

        let mut summary = BatchSummary::default();
        for key in &assigned {
            let outcome = self
                .coordinator
                .run_refresh(key, HolderClass::ShardWorker)
                .await?;
            summary.record(&outcome);
        }

        info!(shard_id = self.shard_id, summary = %summary, "shard worker finished");
        Ok(summary)
    }
}

/// Full-catalog refresh run by the external periodic trigger.
pub struct ScheduledRefresh {
    coordinator: Arc<Coordinator>,
}

impl ScheduledRefresh {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Refresh every key in the catalog once.
    pub async fn run(&self) -> Result<BatchSummary, StoreError> {
        let catalog = self.coordinator.listings().list_keys().await?;
        info!(catalog = catalog.len(), "scheduled refresh starting");

        let mut summary = BatchSummary::default();
        for key in &catalog {
            let outcome = self
                .coordinator
                .run_refresh(key, HolderClass::Scheduled)
                .await?;
            summary.record(&outcome);
        }

        info!(summary = %summary, "scheduled refresh finished");
        Ok(summary)
    }
}
