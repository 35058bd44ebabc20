//! Lease manager with priority preemption
//!
//! Acquire/release/inspect over a [`LeaseStore`], with TTL expiry observed
//! lazily (no sweeper) and the fixed priority matrix from
//! [`HolderClass::preempts`]. Every acquire compiles down to one atomic
//! conditional update; the upsert path for first-time keys re-checks the
//! condition when it loses the creation race.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::debug;

use super::store::{LeaseCondition, LeaseRecord, LeaseStore, LeaseWrite, StoreError};
use super::HolderClass;
use crate::metrics;
use crate::models::ResourceKey;

/// Read-only snapshot returned by [`LeaseManager::inspect`].
pub type LeaseInfo = LeaseRecord;

/// Coordinates exclusive per-key refresh work across actor processes.
pub struct LeaseManager {
    store: Arc<dyn LeaseStore>,
    ttl: Duration,
}

impl LeaseManager {
    /// Create a manager over the given store with the given lease TTL.
    pub fn new(store: Arc<dyn LeaseStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Try to take the lease for `key` on behalf of `class`.
    ///
    /// Succeeds when the key is free, the current lease is expired, or the
    /// holding class is preemptable by `class`. On success the record is
    /// atomically set to `{held: true, holder_class: class, last_updated:
    /// now}`.
    pub async fn acquire(
        &self,
        key: &ResourceKey,
        class: HolderClass,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let condition = LeaseCondition::Acquirable {
            expired_before: now - self.ttl,
            preemptable: class.preempts().to_vec(),
        };
        let write = LeaseWrite {
            held: true,
            holder_class: class,
            acquired_at: Some(now),
            last_updated: now,
        };

        let outcome = self.store.conditional_update(key, &condition, &write).await?;
        if outcome.applied {
            debug!(key = %key, class = %class, "lease acquired");
            metrics::record_lease_acquired(class.as_str());
            return Ok(true);
        }

        if outcome.matched {
            // Held by a class we cannot preempt and not yet expired.
            return Ok(false);
        }

        // First acquire ever for this key: create the record. If a
        // concurrent acquirer created it in the meantime, fall back to one
        // more conditional attempt and treat rejection as failure.
        let record = LeaseRecord::held_by(key.clone(), class, now);
        if self.store.upsert_if_absent(key, record).await? {
            debug!(key = %key, class = %class, "lease created and acquired");
            metrics::record_lease_acquired(class.as_str());
            return Ok(true);
        }

        let outcome = self.store.conditional_update(key, &condition, &write).await?;
        if outcome.applied {
            metrics::record_lease_acquired(class.as_str());
        }
        Ok(outcome.applied)
    }

    /// Release the lease for `key` only if `class` still holds
    /// it. Returns false without mutating anything when the lease was
    /// preempted; the caller must not assume ownership afterwards.
    pub async fn release(
        &self,
        key: &ResourceKey,
        class: HolderClass,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let write = LeaseWrite {
            held: false,
            holder_class: class,
            acquired_at: None,
            last_updated: now,
        };

        let outcome = self
            .store
            .conditional_update(key, &LeaseCondition::HeldBy(class), &write)
            .await?;

        if outcome.applied {
            debug!(key = %key, class = %class, "lease released");
        } else {
            debug!(key = %key, class = %class, "release skipped, lease not owned");
        }
        Ok(outcome.applied)
    }

    /// Read-only snapshot of the current lease state. Does not refresh
    /// `last_updated`.
    pub async fn inspect(&self, key: &ResourceKey) -> Result<Option<LeaseInfo>, StoreError> {
        self.store.read(key).await
    }

    /// Whether `class` currently holds an unexpired lease on `key`.
    ///
    /// This is the ownership re-validation used at every commit-protocol
    /// checkpoint.
    pub async fn owns(
        &self,
        key: &ResourceKey,
        class: HolderClass,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Some(info) = self.inspect(key).await? else {
            return Ok(false);
        };
        Ok(info.held && info.holder_class == class && !info.is_expired(now, self.ttl))
    }
}
