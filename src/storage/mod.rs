//! Persisted listing state
//!
//! The listing store holds, per resource key, the merged movie records and
//! a refresh-status row. All mutation of this state for a key happens only
//! while that key's lease is held by the mutator; the store itself adds no
//! locking beyond each statement's own atomicity.

pub mod memory;
pub mod postgres;

pub use memory::MemoryListingStore;
pub use postgres::PostgresListingStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::lease::store::StoreError;
use crate::models::{LocationRecord, Movie, RefreshStatus, ResourceKey};

/// Persistent movie/theater/showtime state plus per-location status.
#[async_trait]
pub trait ListingStore: Send + Sync {
    /// All keys known to the catalog.
    async fn list_keys(&self) -> Result<Vec<ResourceKey>, StoreError>;

    /// Load the persisted movies for a key (empty when unknown).
    async fn load_movies(&self, key: &ResourceKey) -> Result<Vec<Movie>, StoreError>;

    /// Replace the persisted movies for a key with the reconciled set.
    async fn replace_movies(&self, key: &ResourceKey, movies: &[Movie])
        -> Result<(), StoreError>;

    /// Current status record for a key.
    async fn location(&self, key: &ResourceKey) -> Result<Option<LocationRecord>, StoreError>;

    /// Upsert the refresh status for a key. `Fresh` stamps
    /// `last_refreshed = now`; `Stale`/`Error` keep the previous stamp so
    /// freshness age stays truthful.
    async fn mark_status(
        &self,
        key: &ResourceKey,
        status: RefreshStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
