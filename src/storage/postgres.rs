//! PostgreSQL-backed listing store
//!
//! Movies are stored one JSONB document per (key, title identity) so a
//! replace is a delete-and-insert inside one transaction; location status
//! rows are upserted with `ON CONFLICT`. The `last_refreshed` stamp only
//! moves forward on a `fresh` write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use super::ListingStore;
use crate::config::StoreConfig;
use crate::lease::store::StoreError;
use crate::models::{LocationRecord, Movie, RefreshStatus, ResourceKey};

/// Listing store on PostgreSQL `locations` and `movies` tables.
pub struct PostgresListingStore {
    pool: Pool,
}

impl PostgresListingStore {
    /// Create a connection pool and verify the store is reachable.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut pool_config = PoolConfig::new();
        pool_config.url = Some(config.database_url.clone());
        pool_config.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let client = pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(Self { pool })
    }

    /// Create the listing tables if they do not exist.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let client = self.client().await?;

        client
            .batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS locations (
                    key TEXT PRIMARY KEY,
                    display_key TEXT NOT NULL,
                    status VARCHAR(10) NOT NULL,
                    message TEXT,
                    last_refreshed TIMESTAMPTZ
                );

                CREATE TABLE IF NOT EXISTS movies (
                    key TEXT NOT NULL,
                    title_id TEXT NOT NULL,
                    record JSONB NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL,
                    PRIMARY KEY (key, title_id)
                );

                CREATE INDEX IF NOT EXISTS idx_movies_key ON movies(key);
                "#,
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        tracing::info!("Listing schema initialized");
        Ok(())
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl ListingStore for PostgresListingStore {
    async fn list_keys(&self) -> Result<Vec<ResourceKey>, StoreError> {
        let client = self.client().await?;

        let rows = client
            .query("SELECT display_key FROM locations ORDER BY key", &[])
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            let display: String = row.get(0);
            let key = ResourceKey::parse(&display).ok_or_else(|| StoreError::Corrupt {
                key: display.clone(),
                reason: "stored display key does not parse".to_string(),
            })?;
            keys.push(key);
        }
        Ok(keys)
    }

    async fn load_movies(&self, key: &ResourceKey) -> Result<Vec<Movie>, StoreError> {
        let client = self.client().await?;

        let rows = client
            .query(
                "SELECT record FROM movies WHERE key = $1 ORDER BY title_id",
                &[&key.canonical()],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut movies = Vec::with_capacity(rows.len());
        for row in rows {
            let value: serde_json::Value = row.get(0);
            let movie: Movie =
                serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
                    key: key.to_string(),
                    reason: format!("stored movie does not decode: {e}"),
                })?;
            movies.push(movie);
        }
        Ok(movies)
    }

    async fn replace_movies(
        &self,
        key: &ResourceKey,
        movies: &[Movie],
    ) -> Result<(), StoreError> {
        let mut client = self.client().await?;
        let tx = client
            .transaction()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        tx.execute("DELETE FROM movies WHERE key = $1", &[&key.canonical()])
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let statement = tx
            .prepare(
                "INSERT INTO movies (key, title_id, record, updated_at)
                 VALUES ($1, $2, $3, $4)
                 ON CONFLICT (key, title_id) DO UPDATE SET
                     record = EXCLUDED.record,
                     updated_at = EXCLUDED.updated_at",
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let now = Utc::now();
        for movie in movies {
            // Movies without an identity never reach persistence; the
            // merge engine drops them first
            let Some(title_id) = movie.identity() else {
                continue;
            };
            let record = serde_json::to_value(movie).map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("movie does not encode: {e}"),
            })?;
            tx.execute(&statement, &[&key.canonical(), &title_id, &record, &now])
                .await
                .map_err(|e| StoreError::Query(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn location(&self, key: &ResourceKey) -> Result<Option<LocationRecord>, StoreError> {
        let client = self.client().await?;

        let row = client
            .query_opt(
                "SELECT display_key, status, message, last_refreshed
                 FROM locations WHERE key = $1",
                &[&key.canonical()],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let display: String = row.get(0);
        let key = ResourceKey::parse(&display).ok_or_else(|| StoreError::Corrupt {
            key: display.clone(),
            reason: "stored display key does not parse".to_string(),
        })?;
        let status_str: String = row.get(1);
        let status = RefreshStatus::parse(&status_str).ok_or_else(|| StoreError::Corrupt {
            key: display,
            reason: format!("unknown status '{status_str}'"),
        })?;

        Ok(Some(LocationRecord {
            key,
            status,
            message: row.get(2),
            last_refreshed: row.get(3),
        }))
    }

    async fn mark_status(
        &self,
        key: &ResourceKey,
        status: RefreshStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let client = self.client().await?;
        let fresh = status == RefreshStatus::Fresh;
        let stamp: Option<DateTime<Utc>> = fresh.then_some(now);

        client
            .execute(
                "INSERT INTO locations (key, display_key, status, message, last_refreshed)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (key) DO UPDATE SET
                     status = EXCLUDED.status,
                     message = EXCLUDED.message,
                     last_refreshed = COALESCE(EXCLUDED.last_refreshed, locations.last_refreshed)",
                &[
                    &key.canonical(),
                    &key.to_string(),
                    &status.as_str(),
                    &message,
                    &stamp,
                ],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }
}
