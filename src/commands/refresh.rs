//! Scheduled full-catalog refresh command

use anyhow::Result;

use super::{build_coordinator, resolve_acquirer};
use crate::config::Config;
use crate::orchestrator::ScheduledRefresh;

/// Refresh every location in the catalog once.
pub async fn refresh(acquirer: Option<String>, config: Config) -> Result<()> {
    let acquirer_cmd = resolve_acquirer(acquirer)?;
    let coordinator = build_coordinator(&config, &acquirer_cmd).await?;

    let refresh = ScheduledRefresh::new(coordinator);
    let summary = refresh.run().await?;

    println!("Scheduled refresh: {summary}");
    Ok(())
}
