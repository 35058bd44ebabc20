//! Lease store contract and in-memory implementation
//!
//! The store exposes exactly three primitives: `read`, `conditional_update`
//! and `upsert_if_absent`. The conditional update must be atomic: it is
//! the compare-and-swap the whole coordination layer rests on. Conditions
//! are encoded as data rather than closures so a SQL-backed store can
//! translate them into a single `UPDATE ... WHERE` statement.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;

use super::HolderClass;
use crate::models::ResourceKey;

/// Errors surfaced by lease store implementations.
///
/// An unreachable store is fatal for the current invocation; the external
/// scheduler retries on the next cycle.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Store cannot be reached (connection refused, pool exhausted, ...)
    #[error("lease store unavailable: {0}")]
    Unavailable(String),

    /// A query failed after the connection was established
    #[error("lease store query failed: {0}")]
    Query(String),

    /// A stored record could not be decoded
    #[error("corrupt lease record for '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

/// Persistent lease state for one resource key.
///
/// Exactly one record exists per key once any acquire has been attempted;
/// records are upserted, never duplicated, and a released lease keeps its
/// row with `held: false` rather than being deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub key: ResourceKey,
    pub held: bool,
    pub holder_class: HolderClass,
    pub acquired_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl LeaseRecord {
    /// A freshly acquired lease.
    pub fn held_by(key: ResourceKey, class: HolderClass, now: DateTime<Utc>) -> Self {
        Self {
            key,
            held: true,
            holder_class: class,
            acquired_at: now,
            last_updated: now,
        }
    }

    /// Whether the lease has outlived the TTL and may be taken by anyone.
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.last_updated > ttl
    }
}

/// Predicate for a conditional update, expressed as data.
#[derive(Debug, Clone)]
pub enum LeaseCondition {
    /// The record is free, expired before the given instant, or held by
    /// one of the listed (preemptable) classes.
    Acquirable {
        expired_before: DateTime<Utc>,
        preemptable: Vec<HolderClass>,
    },

    /// The record is currently held by exactly this class.
    HeldBy(HolderClass),
}

impl LeaseCondition {
    /// Evaluate the predicate against an existing record.
    pub fn matches(&self, record: &LeaseRecord) -> bool {
        match self {
            Self::Acquirable {
                expired_before,
                preemptable,
            } => {
                !record.held
                    || record.last_updated < *expired_before
                    || preemptable.contains(&record.holder_class)
            }
            Self::HeldBy(class) => record.held && record.holder_class == *class,
        }
    }
}

/// Field values applied by a conditional update.
///
/// `acquired_at: None` preserves the stored value, which lets `release`
/// set only `{held, last_updated}` without a read-modify-write race.
#[derive(Debug, Clone)]
pub struct LeaseWrite {
    pub held: bool,
    pub holder_class: HolderClass,
    pub acquired_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

/// Result of a conditional update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// A record exists for the key.
    pub matched: bool,
    /// The record existed, satisfied the condition, and was updated.
    pub applied: bool,
}

impl UpdateOutcome {
    pub const MISSED: Self = Self {
        matched: false,
        applied: false,
    };

    pub const REJECTED: Self = Self {
        matched: true,
        applied: false,
    };

    pub const APPLIED: Self = Self {
        matched: true,
        applied: true,
    };
}

/// Persistent, atomically-updatable mapping from resource key to lease
/// state. All coordination between actor processes goes through this.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Read the current record, if any. Never mutates.
    async fn read(&self, key: &ResourceKey) -> Result<Option<LeaseRecord>, StoreError>;

    /// Atomically apply `write` to the record iff `condition` holds.
    async fn conditional_update(
        &self,
        key: &ResourceKey,
        condition: &LeaseCondition,
        write: &LeaseWrite,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Create the record iff none exists. Returns true when created.
    async fn upsert_if_absent(
        &self,
        key: &ResourceKey,
        record: LeaseRecord,
    ) -> Result<bool, StoreError>;
}

/// In-memory lease store for tests and single-process runs.
///
/// A single mutex around the map makes every operation atomic, matching
/// the contract the PostgreSQL store gets from single-statement updates.
#[derive(Default)]
pub struct MemoryLeaseStore {
    records: Mutex<HashMap<String, LeaseRecord>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn read(&self, key: &ResourceKey) -> Result<Option<LeaseRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records.get(key.canonical()).cloned())
    }

    async fn conditional_update(
        &self,
        key: &ResourceKey,
        condition: &LeaseCondition,
        write: &LeaseWrite,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut records = self.records.lock().await;

        let Some(record) = records.get_mut(key.canonical()) else {
            return Ok(UpdateOutcome::MISSED);
        };

        if !condition.matches(record) {
            return Ok(UpdateOutcome::REJECTED);
        }

        record.held = write.held;
        record.holder_class = write.holder_class;
        if let Some(acquired_at) = write.acquired_at {
            record.acquired_at = acquired_at;
        }
        record.last_updated = write.last_updated;

        Ok(UpdateOutcome::APPLIED)
    }

    async fn upsert_if_absent(
        &self,
        key: &ResourceKey,
        record: LeaseRecord,
    ) -> Result<bool, StoreError> {
        let mut records = self.records.lock().await;

        if records.contains_key(key.canonical()) {
            return Ok(false);
        }
        records.insert(key.canonical().to_string(), record);
        Ok(true)
    }
}
