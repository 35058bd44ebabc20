//! On-demand refresh command (interactive path)

use anyhow::{bail, Result};

use super::{build_coordinator, resolve_acquirer};
use crate::config::Config;
use crate::models::ResourceKey;
use crate::orchestrator::OnDemandHandler;

/// Refresh one location with interactive priority.
pub async fn demand(location: String, acquirer: Option<String>, config: Config) -> Result<()> {
    let Some(key) = ResourceKey::parse(&location) else {
        bail!("invalid location '{location}'; expected \"City, Country\" or \"City, Region, Country\"");
    };

    let acquirer_cmd = resolve_acquirer(acquirer)?;
    let coordinator = build_coordinator(&config, &acquirer_cmd).await?;
    let handler = OnDemandHandler::new(coordinator);

    let response = handler.refresh(&key).await?;
    println!("{}: {}", key, response.user_message());

    Ok(())
}
