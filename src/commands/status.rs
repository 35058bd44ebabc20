//! Location status inspection command

use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::sync::Arc;

use crate::config::Config;
use crate::coverage::CoveragePlanner;
use crate::lease::{LeaseManager, PostgresLeaseStore};
use crate::models::ResourceKey;
use crate::storage::{ListingStore, PostgresListingStore};

/// Print lease, refresh and coverage state for one location.
pub async fn status(location: String, config: Config) -> Result<()> {
    let Some(key) = ResourceKey::parse(&location) else {
        bail!("invalid location '{location}'; expected \"City, Country\" or \"City, Region, Country\"");
    };

    let lease_store = PostgresLeaseStore::connect(&config.store)
        .await
        .context("failed to connect lease store")?;
    lease_store.init_schema().await?;
    let leases = LeaseManager::new(Arc::new(lease_store), config.coordination.lease_ttl());

    let listings = PostgresListingStore::connect(&config.store)
        .await
        .context("failed to connect listing store")?;
    listings.init_schema().await?;

    let now = Utc::now();
    println!("Location: {key}");

    match leases.inspect(&key).await? {
        Some(info) if info.held => {
            let expired = if info.is_expired(now, config.coordination.lease_ttl()) {
                " (expired)"
            } else {
                ""
            };
            println!(
                "Lease:    held by {}{expired}, acquired {}, updated {}",
                info.holder_class, info.acquired_at, info.last_updated
            );
        }
        Some(info) => {
            println!("Lease:    free (last held by {})", info.holder_class);
        }
        None => println!("Lease:    never acquired"),
    }

    match listings.location(&key).await? {
        Some(record) => {
            let refreshed = record
                .last_refreshed
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            print!("Status:   {} (last refreshed {refreshed})", record.status);
            if let Some(message) = &record.message {
                print!(" ({message})");
            }
            println!();
        }
        None => println!("Status:   unknown location"),
    }

    let movies = listings.load_movies(&key).await?;
    let planner = CoveragePlanner::new(config.coordination.coverage_horizon_days);
    let report = planner.report(&movies, now);

    println!(
        "Coverage: {}/{} target dates covered ({} movies persisted)",
        report.covered.len(),
        report.target.days(),
        movies.len()
    );
    match report.plan {
        Some(window) => println!("Plan:     fetch {window}"),
        None => println!("Plan:     nothing to fetch"),
    }

    Ok(())
}
