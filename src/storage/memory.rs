//! In-memory listing store for tests and single-process runs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::ListingStore;
use crate::lease::store::StoreError;
use crate::models::{LocationRecord, Movie, RefreshStatus, ResourceKey};

#[derive(Default)]
struct Inner {
    locations: HashMap<String, LocationRecord>,
    movies: HashMap<String, Vec<Movie>>,
}

/// Listing store backed by process-local maps.
#[derive(Default)]
pub struct MemoryListingStore {
    inner: Mutex<Inner>,
}

impl MemoryListingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a key into the catalog without touching its status history.
    pub async fn register_key(&self, key: &ResourceKey) {
        let mut inner = self.inner.lock().await;
        inner
            .locations
            .entry(key.canonical().to_string())
            .or_insert_with(|| LocationRecord {
                key: key.clone(),
                status: RefreshStatus::Stale,
                message: None,
                last_refreshed: None,
            });
    }
}

#[async_trait]
impl ListingStore for MemoryListingStore {
    async fn list_keys(&self) -> Result<Vec<ResourceKey>, StoreError> {
        let inner = self.inner.lock().await;
        let mut keys: Vec<ResourceKey> =
            inner.locations.values().map(|r| r.key.clone()).collect();
        keys.sort_by(|a, b| a.canonical().cmp(b.canonical()));
        Ok(keys)
    }

    async fn load_movies(&self, key: &ResourceKey) -> Result<Vec<Movie>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.movies.get(key.canonical()).cloned().unwrap_or_default())
    }

    async fn replace_movies(
        &self,
        key: &ResourceKey,
        movies: &[Movie],
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .movies
            .insert(key.canonical().to_string(), movies.to_vec());
        Ok(())
    }

    async fn location(&self, key: &ResourceKey) -> Result<Option<LocationRecord>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.locations.get(key.canonical()).cloned())
    }

    async fn mark_status(
        &self,
        key: &ResourceKey,
        status: RefreshStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .locations
            .entry(key.canonical().to_string())
            .or_insert_with(|| LocationRecord {
                key: key.clone(),
                status,
                message: None,
                last_refreshed: None,
            });

        entry.status = status;
        entry.message = message.map(str::to_string);
        if status == RefreshStatus::Fresh {
            entry.last_refreshed = Some(now);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ResourceKey {
        ResourceKey::parse(name).unwrap()
    }

    #[tokio::test]
    async fn test_mark_fresh_stamps_last_refreshed() {
        let store = MemoryListingStore::new();
        let now = Utc::now();
        let k = key("Lviv, Ukraine");

        store
            .mark_status(&k, RefreshStatus::Fresh, None, now)
            .await
            .unwrap();

        let record = store.location(&k).await.unwrap().unwrap();
        assert_eq!(record.status, RefreshStatus::Fresh);
        assert_eq!(record.last_refreshed, Some(now));
    }

    #[tokio::test]
    async fn test_mark_error_preserves_last_refreshed() {
        let store = MemoryListingStore::new();
        let now = Utc::now();
        let k = key("Lviv, Ukraine");

        store
            .mark_status(&k, RefreshStatus::Fresh, None, now)
            .await
            .unwrap();
        store
            .mark_status(&k, RefreshStatus::Error, Some("fetch failed"), now)
            .await
            .unwrap();

        let record = store.location(&k).await.unwrap().unwrap();
        assert_eq!(record.status, RefreshStatus::Error);
        assert_eq!(record.message.as_deref(), Some("fetch failed"));
        assert_eq!(record.last_refreshed, Some(now));
    }

    #[tokio::test]
    async fn test_list_keys_is_sorted_and_deduplicated() {
        let store = MemoryListingStore::new();
        store.register_key(&key("Lviv, Ukraine")).await;
        store.register_key(&key("Kyiv, Ukraine")).await;
        store.register_key(&key("  KYIV , Ukraine ")).await;

        let keys = store.list_keys().await.unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].city(), "Kyiv");
    }

    #[tokio::test]
    async fn test_replace_and_load_movies() {
        let store = MemoryListingStore::new();
        let k = key("Lviv, Ukraine");

        assert!(store.load_movies(&k).await.unwrap().is_empty());

        let movie = Movie::default();
        store.replace_movies(&k, &[movie]).await.unwrap();
        assert_eq!(store.load_movies(&k).await.unwrap().len(), 1);

        store.replace_movies(&k, &[]).await.unwrap();
        assert!(store.load_movies(&k).await.unwrap().is_empty());
    }
}
