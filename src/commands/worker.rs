//! Shard worker command
//!
//! Invoked once per cycle by the external scheduler with this worker's
//! shard id. The worker filters the catalog locally and processes only
//! its own subset; no coordination with sibling workers is needed.

use anyhow::{bail, Result};

use super::{build_coordinator, resolve_acquirer};
use crate::config::Config;
use crate::orchestrator::ShardWorker;

/// Run one shard worker cycle.
pub async fn worker(
    shard_id: u32,
    shards: Option<u32>,
    acquirer: Option<String>,
    config: Config,
) -> Result<()> {
    let total_shards = shards.unwrap_or(config.coordination.total_shards);
    if total_shards == 0 {
        bail!("shards must be greater than 0");
    }
    if shard_id >= total_shards {
        bail!("shard_id must be between 0 and {}", total_shards - 1);
    }

    let acquirer_cmd = resolve_acquirer(acquirer)?;
    let coordinator = build_coordinator(&config, &acquirer_cmd).await?;

    let worker = ShardWorker::new(coordinator, shard_id, total_shards);
    let summary = worker.run().await?;

    println!("Shard {shard_id}/{total_shards}: {summary}");
    Ok(())
}
