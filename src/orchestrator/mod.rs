//! Refresh orchestration
//!
//! One pipeline serves all three actor kinds: acquire lease → plan
//! coverage → fetch → reconcile → checkpointed writes → release. The
//! on-demand handler and the batch runners are thin wrappers that pick a
//! holder class, sequence keys and map outcomes for their callers.

pub mod commit;
pub mod demand;
pub mod worker;

pub use commit::OwnershipGuard;
pub use demand::{DemandResponse, OnDemandHandler};
pub use worker::{BatchSummary, ScheduledRefresh, ShardWorker};

use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::acquire::Acquirer;
use crate::config::CoordinationConfig;
use crate::coverage::CoveragePlanner;
use crate::lease::store::StoreError;
use crate::lease::{HolderClass, LeaseManager};
use crate::merge::{MergeEngine, MergePolicy, MergeStats};
use crate::metrics;
use crate::models::{FetchRange, RefreshStatus, ResourceKey};
use crate::storage::ListingStore;

/// Result of one refresh cycle for one key.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The window was fetched, reconciled and committed.
    Completed {
        window: FetchRange,
        stats: MergeStats,
    },

    /// Every target date already has data; nothing was fetched.
    Covered,

    /// The location was refreshed recently; skipped before planning.
    FreshEnough,

    /// The lease is held by another actor. Carries the holder observed
    /// right after the failed acquire, when one was visible.
    InProgress(Option<HolderClass>),

    /// Ownership was lost at a checkpoint; all remaining writes were
    /// discarded and the lease was left untouched.
    Preempted,

    /// The acquirer failed; the error was recorded against the key.
    Failed(String),
}

impl RunOutcome {
    /// Stable label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Covered => "covered",
            Self::FreshEnough => "fresh",
            Self::InProgress(_) => "in-progress",
            Self::Preempted => "preempted",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether this outcome counts as a skip in batch tallies.
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::Covered | Self::FreshEnough | Self::InProgress(_) | Self::Preempted
        )
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { window, stats } => write!(
                f,
                "completed (window {window}, {} added, {} pruned)",
                stats.showtimes_added, stats.showtimes_pruned
            ),
            Self::Covered => write!(f, "covered"),
            Self::FreshEnough => write!(f, "fresh"),
            Self::InProgress(Some(holder)) => write!(f, "in progress ({holder})"),
            Self::InProgress(None) => write!(f, "in progress"),
            Self::Preempted => write!(f, "preempted"),
            Self::Failed(msg) => write!(f, "failed: {msg}"),
        }
    }
}

/// Shared refresh pipeline over the coordination components.
pub struct Coordinator {
    leases: Arc<LeaseManager>,
    listings: Arc<dyn ListingStore>,
    acquirer: Arc<dyn Acquirer>,
    planner: CoveragePlanner,
    engine: MergeEngine,
    policy: CoordinationConfig,
}

impl Coordinator {
    pub fn new(
        leases: Arc<LeaseManager>,
        listings: Arc<dyn ListingStore>,
        acquirer: Arc<dyn Acquirer>,
        policy: CoordinationConfig,
    ) -> Self {
        let planner = CoveragePlanner::new(policy.coverage_horizon_days);
        let engine = MergeEngine::new(MergePolicy {
            prune_grace: policy.prune_grace(),
            admission_lead: policy.admission_lead(),
        });

        Self {
            leases,
            listings,
            acquirer,
            planner,
            engine,
            policy,
        }
    }

    pub fn leases(&self) -> &LeaseManager {
        &self.leases
    }

    pub fn listings(&self) -> &Arc<dyn ListingStore> {
        &self.listings
    }

    pub fn planner(&self) -> CoveragePlanner {
        self.planner
    }

    pub fn policy(&self) -> &CoordinationConfig {
        &self.policy
    }

    /// Run one refresh cycle for `key` on behalf of `class`.
    ///
    /// Store errors are fatal for the invocation and bubble up; everything
    /// per-key (lease contention, preemption, acquirer failure) is folded
    /// into the returned [`RunOutcome`] so batch callers can keep going.
    pub async fn run_refresh(
        &self,
        key: &ResourceKey,
        class: HolderClass,
    ) -> Result<RunOutcome, StoreError> {
        let now = Utc::now();

        // Skip keys refreshed recently; background cycles run daily and
        // should not hammer locations that are already current.
        if let Some(location) = self.listings.location(key).await? {
            if location.is_fresh_within(now, self.policy.min_refresh_interval()) {
                debug!(key = %key, "listings are fresh, skipping");
                return Ok(self.finish(key, class, RunOutcome::FreshEnough));
            }
        }

        if !self.leases.acquire(key, class, now).await? {
            let holder = self
                .leases
                .inspect(key)
                .await?
                .filter(|info| info.held)
                .map(|info| info.holder_class);
            return Ok(self.finish(key, class, RunOutcome::InProgress(holder)));
        }

        let guard = OwnershipGuard::new(&self.leases, key, class);

        let existing = self.listings.load_movies(key).await?;
        let Some(window) = self.planner.plan(&existing, now) else {
            // Full coverage: release and serve what we have
            self.leases.release(key, class, Utc::now()).await?;
            return Ok(self.finish(key, class, RunOutcome::Covered));
        };

        // Cheap abort before the expensive external call
        if !guard.still_owned("before-fetch").await? {
            return Ok(self.finish(key, class, RunOutcome::Preempted));
        }

        info!(key = %key, class = %class, window = %window, "fetching listings");
        let started = Instant::now();
        let fetched = self.acquirer.fetch(key, window).await;
        metrics::record_fetch_duration(class.as_str(), started.elapsed().as_secs_f64());

        // The fetch may have taken minutes; anything already computed is
        // discarded when the lease moved on
        if !guard.still_owned("after-fetch").await? {
            return Ok(self.finish(key, class, RunOutcome::Preempted));
        }

        let acquisition = match fetched {
            Ok(acquisition) => acquisition,
            Err(err) => {
                let now = Utc::now();
                self.listings
                    .mark_status(key, RefreshStatus::Error, Some(err.message()), now)
                    .await?;
                self.leases.release(key, class, now).await?;
                return Ok(self.finish(key, class, RunOutcome::Failed(err.to_string())));
            }
        };

        let now = Utc::now();
        let merged = self.engine.reconcile(existing, &acquisition.movies, now);

        // Checkpoint 1: before marking the coverage status refreshed
        if !guard.still_owned("before-status-write").await? {
            return Ok(self.finish(key, class, RunOutcome::Preempted));
        }
        self.listings
            .mark_status(key, RefreshStatus::Fresh, None, now)
            .await?;

        // Checkpoint 2: before the merge engine's persisted write
        if !guard.still_owned("before-movie-write").await? {
            return Ok(self.finish(key, class, RunOutcome::Preempted));
        }
        self.listings.replace_movies(key, &merged.movies).await?;
        metrics::record_merge_activity(merged.stats.showtimes_added, merged.stats.showtimes_pruned);

        // Checkpoint 3: before release
        if !guard.still_owned("before-release").await? {
            return Ok(self.finish(key, class, RunOutcome::Preempted));
        }
        self.leases.release(key, class, Utc::now()).await?;

        Ok(self.finish(
            key,
            class,
            RunOutcome::Completed {
                window,
                stats: merged.stats,
            },
        ))
    }

    fn finish(&self, key: &ResourceKey, class: HolderClass, outcome: RunOutcome) -> RunOutcome {
        metrics::record_refresh_outcome(class.as_str(), outcome.as_str());
        info!(key = %key, class = %class, outcome = %outcome.as_str(), "refresh cycle finished");
        outcome
    }
}
