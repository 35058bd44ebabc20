//! On-demand refresh handler (interactive path)
//!
//! Thin wrapper over the shared pipeline that runs with the
//! `interactive` holder class and maps outcomes to the states a
//! user-facing caller needs to render.

use std::sync::Arc;

use super::{Coordinator, RunOutcome};
use crate::lease::store::StoreError;
use crate::lease::HolderClass;
use crate::models::ResourceKey;

/// Caller-visible result of an on-demand refresh.
#[derive(Debug, Clone)]
pub enum DemandResponse {
    /// Listings are current and can be served.
    Ready(RunOutcome),

    /// The lease is held by someone else. When the holder is a background
    /// class this is a benign timing gap, not a real block: interactive
    /// requests preempt background work.
    InProgress { holder: Option<HolderClass> },

    /// A newer holder took the lease mid-refresh; retry shortly.
    Superseded,

    /// The acquirer failed; the message is opaque.
    Failed(String),
}

impl DemandResponse {
    /// Human-readable state for the front-end caller.
    pub fn user_message(&self) -> String {
        match self {
            Self::Ready(_) => "showtimes are up to date".to_string(),
            Self::InProgress {
                holder: Some(HolderClass::Interactive),
            } => "another interactive request in progress".to_string(),
            Self::InProgress { .. } => {
                "background refresh in progress, will complete shortly".to_string()
            }
            Self::Superseded => "a newer refresh took over, retry shortly".to_string(),
            Self::Failed(msg) => format!("refresh failed: {msg}"),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

/// Handles a single location refresh on behalf of an interactive caller.
pub struct OnDemandHandler {
    coordinator: Arc<Coordinator>,
}

impl OnDemandHandler {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self { coordinator }
    }

    /// Refresh one key with interactive priority.
    pub async fn refresh(&self, key: &ResourceKey) -> Result<DemandResponse, StoreError> {
        let outcome = self
            .coordinator
            .run_refresh(key, HolderClass::Interactive)
            .await?;

        Ok(match outcome {
            RunOutcome::Completed { .. } | RunOutcome::Covered | RunOutcome::FreshEnough => {
                DemandResponse::Ready(outcome)
            }
            RunOutcome::InProgress(holder) => DemandResponse::InProgress { holder },
            RunOutcome::Preempted => DemandResponse::Superseded,
            RunOutcome::Failed(msg) => DemandResponse::Failed(msg),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages_per_holder_class() {
        let interactive = DemandResponse::InProgress {
            holder: Some(HolderClass::Interactive),
        };
        assert_eq!(
            interactive.user_message(),
            "another interactive request in progress"
        );

        for holder in [
            Some(HolderClass::Scheduled),
            Some(HolderClass::ShardWorker),
            None,
        ] {
            let response = DemandResponse::InProgress { holder };
            assert_eq!(
                response.user_message(),
                "background refresh in progress, will complete shortly"
            );
        }
    }

    #[test]
    fn test_ready_and_failed_messages() {
        assert!(DemandResponse::Ready(RunOutcome::Covered).is_ready());
        assert!(!DemandResponse::Superseded.is_ready());

        let failed = DemandResponse::Failed("no showtimes found".to_string());
        assert!(failed.user_message().contains("no showtimes found"));
    }
}
