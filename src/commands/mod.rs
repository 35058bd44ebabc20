//! CLI command handlers

pub mod demand;
pub mod refresh;
pub mod status;
pub mod worker;

// Re-export command functions for convenience
pub use demand::demand;
pub use refresh::refresh;
pub use status::status;
pub use worker::worker;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::acquire::{Acquirer, CommandAcquirer, RetryingAcquirer};
use crate::config::Config;
use crate::lease::{LeaseManager, PostgresLeaseStore};
use crate::orchestrator::Coordinator;
use crate::storage::PostgresListingStore;
use crate::utils::retry::RetryConfig;

/// Resolve the external acquirer command from the CLI arg or environment.
pub fn resolve_acquirer(arg: Option<String>) -> Result<String> {
    arg.or_else(|| std::env::var("MARQUEE_ACQUIRER_CMD").ok())
        .context("no acquirer command; pass --acquirer or set MARQUEE_ACQUIRER_CMD")
}

/// Connect both stores, initialize schemas and assemble the coordinator.
pub async fn build_coordinator(config: &Config, acquirer_cmd: &str) -> Result<Arc<Coordinator>> {
    crate::metrics::init_metrics();

    let lease_store = PostgresLeaseStore::connect(&config.store)
        .await
        .context("failed to connect lease store")?;
    lease_store.init_schema().await?;

    let listing_store = PostgresListingStore::connect(&config.store)
        .await
        .context("failed to connect listing store")?;
    listing_store.init_schema().await?;

    let leases = Arc::new(LeaseManager::new(
        Arc::new(lease_store),
        config.coordination.lease_ttl(),
    ));

    let acquirer: Arc<dyn Acquirer> = Arc::new(RetryingAcquirer::new(
        CommandAcquirer::new(acquirer_cmd),
        RetryConfig::default(),
    ));

    Ok(Arc::new(Coordinator::new(
        leases,
        Arc::new(listing_store),
        acquirer,
        config.coordination.clone(),
    )))
}
