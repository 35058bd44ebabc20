//! PostgreSQL-backed lease store
//!
//! Each conditional update is a single row-count-checked `UPDATE ... WHERE`
//! statement, which gives the compare-and-swap semantics the manager
//! requires without any explicit locking. First-time records are created
//! with `ON CONFLICT DO NOTHING` so the creation race resolves to exactly
//! one winner.

use async_trait::async_trait;
use deadpool_postgres::{Config as PoolConfig, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::NoTls;

use super::store::{
    LeaseCondition, LeaseRecord, LeaseStore, LeaseWrite, StoreError, UpdateOutcome,
};
use super::HolderClass;
use crate::config::StoreConfig;
use crate::models::ResourceKey;

/// Lease store on a PostgreSQL table with one row per resource key.
pub struct PostgresLeaseStore {
    pool: Pool,
}

impl PostgresLeaseStore {
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

        // Test connection before handing the store out
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

    /// Create the leases table if it does not exist.
    pub async fn init_schema(&self) -> Result<(), StoreError> {
        let client = self.client().await?;

        client
            .batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS leases (
                    key TEXT PRIMARY KEY,
                    display_key TEXT NOT NULL,
                    held BOOLEAN NOT NULL,
                    holder_class VARCHAR(20) NOT NULL,
                    acquired_at TIMESTAMPTZ NOT NULL,
                    last_updated TIMESTAMPTZ NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_leases_last_updated
                    ON leases(last_updated);
                "#,
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        tracing::info!("Lease schema initialized");
        Ok(())
    }

    async fn client(&self) -> Result<deadpool_postgres::Object, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn decode_row(row: &tokio_postgres::Row) -> Result<LeaseRecord, StoreError> {
        let display: String = row.get(0);
        let key = ResourceKey::parse(&display).ok_or_else(|| StoreError::Corrupt {
            key: display.clone(),
            reason: "stored display key does not parse".to_string(),
        })?;

        let class_str: String = row.get(2);
        let holder_class = HolderClass::parse(&class_str).ok_or_else(|| StoreError::Corrupt {
            key: display,
            reason: format!("unknown holder class '{class_str}'"),
        })?;

        Ok(LeaseRecord {
            key,
            held: row.get(1),
            holder_class,
            acquired_at: row.get(3),
            last_updated: row.get(4),
        })
    }
}

#[async_trait]
impl LeaseStore for PostgresLeaseStore {
    async fn read(&self, key: &ResourceKey) -> Result<Option<LeaseRecord>, StoreError> {
        let client = self.client().await?;

        let row = client
            .query_opt(
                "SELECT display_key, held, holder_class, acquired_at, last_updated
                 FROM leases WHERE key = $1",
                &[&key.canonical()],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        row.as_ref().map(Self::decode_row).transpose()
    }

    async fn conditional_update(
        &self,
        key: &ResourceKey,
        condition: &LeaseCondition,
        write: &LeaseWrite,
    ) -> Result<UpdateOutcome, StoreError> {
        let client = self.client().await?;
        let class_str = write.holder_class.as_str();

        let rows = match condition {
            LeaseCondition::Acquirable {
                expired_before,
                preemptable,
            } => {
                let classes: Vec<String> =
                    preemptable.iter().map(|c| c.as_str().to_string()).collect();
                client
                    .execute(
                        "UPDATE leases
                         SET held = $2,
                             holder_class = $3,
                             acquired_at = COALESCE($4, acquired_at),
                             last_updated = $5
                         WHERE key = $1
                           AND (held = FALSE
                                OR last_updated < $6
                                OR holder_class = ANY($7))",
                        &[
                            &key.canonical(),
                            &write.held,
                            &class_str,
                            &write.acquired_at,
                            &write.last_updated,
                            expired_before,
                            &classes,
                        ],
                    )
                    .await
            }
            LeaseCondition::HeldBy(holder) => {
                client
                    .execute(
                        "UPDATE leases
                         SET held = $2,
                             holder_class = $3,
                             acquired_at = COALESCE($4, acquired_at),
                             last_updated = $5
                         WHERE key = $1
                           AND held = TRUE
                           AND holder_class = $6",
                        &[
                            &key.canonical(),
                            &write.held,
                            &class_str,
                            &write.acquired_at,
                            &write.last_updated,
                            &holder.as_str(),
                        ],
                    )
                    .await
            }
        }
        .map_err(|e| StoreError::Query(e.to_string()))?;

        if rows > 0 {
            return Ok(UpdateOutcome::APPLIED);
        }

        // Distinguish "no record for this key" from "condition rejected"
        let exists_row = client
            .query_one(
                "SELECT EXISTS(SELECT 1 FROM leases WHERE key = $1)",
                &[&key.canonical()],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let matched: bool = exists_row.get(0);

        Ok(if matched {
            UpdateOutcome::REJECTED
        } else {
            UpdateOutcome::MISSED
        })
    }

    async fn upsert_if_absent(
        &self,
        key: &ResourceKey,
        record: LeaseRecord,
    ) -> Result<bool, StoreError> {
        let client = self.client().await?;

        let rows = client
            .execute(
                "INSERT INTO leases (key, display_key, held, holder_class, acquired_at, last_updated)
                 VALUES ($1, $2, $3, $4, $5, $6)
                 ON CONFLICT (key) DO NOTHING",
                &[
                    &key.canonical(),
                    &record.key.to_string(),
                    &record.held,
                    &record.holder_class.as_str(),
                    &record.acquired_at,
                    &record.last_updated,
                ],
            )
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(rows > 0)
    }
}
