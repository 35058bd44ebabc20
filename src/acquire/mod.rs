//! Acquirer seam
//!
//! The acquisition capability, however it discovers and extracts
//! listings, is external to the coordination layer and modeled as a
//! black-box async call: `fetch(location, window) -> movies`. It carries
//! no completeness or latency guarantee and may return partial results;
//! the lease TTL bounds how long a stuck call can block other actors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::models::{FetchRange, Movie, ResourceKey};
use crate::utils::retry::{with_retry, RetryConfig};

/// Opaque acquirer failure. The coordination layer records the message
/// per key and moves on; it never interprets it.
#[derive(Error, Debug, Clone)]
#[error("{0}")]
pub struct AcquireError(String);

impl AcquireError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

/// Listings produced by one fetch call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Acquisition {
    pub movies: Vec<Movie>,
}

/// External capability producing listing data for a location and window.
#[async_trait]
pub trait Acquirer: Send + Sync {
    async fn fetch(
        &self,
        key: &ResourceKey,
        window: FetchRange,
    ) -> Result<Acquisition, AcquireError>;
}

/// Acquirer that bridges to an external command.
///
/// The command receives the location and the inclusive date window as
/// arguments and must print an `{"movies": [...]}` JSON document on
/// stdout. Anything else (non-zero exit, unparseable output) becomes an
/// opaque [`AcquireError`].
pub struct CommandAcquirer {
    program: String,
}

impl CommandAcquirer {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Acquirer for CommandAcquirer {
    async fn fetch(
        &self,
        key: &ResourceKey,
        window: FetchRange,
    ) -> Result<Acquisition, AcquireError> {
        debug!(key = %key, window = %window, program = %self.program, "invoking acquirer");

        let child = Command::new(&self.program)
            .arg(key.to_string())
            .arg(window.start.to_string())
            .arg(window.end.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AcquireError::new(format!("failed to spawn acquirer: {e}")))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| AcquireError::new(format!("acquirer did not finish: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AcquireError::new(format!(
                "acquirer exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| AcquireError::new(format!("malformed acquirer output: {e}")))
    }
}

/// Wraps an acquirer with retry and exponential backoff.
///
/// Timeout/retry is the acquirer side's responsibility per the
/// concurrency model; the coordination layer itself imposes no timeout.
/// Total retry time should stay well under the lease TTL.
pub struct RetryingAcquirer<A> {
    inner: A,
    retry: RetryConfig,
}

impl<A: Acquirer> RetryingAcquirer<A> {
    pub fn new(inner: A, retry: RetryConfig) -> Self {
        Self { inner, retry }
    }
}

#[async_trait]
impl<A: Acquirer> Acquirer for RetryingAcquirer<A> {
    async fn fetch(
        &self,
        key: &ResourceKey,
        window: FetchRange,
    ) -> Result<Acquisition, AcquireError> {
        with_retry(&self.retry, || async {
            self.inner
                .fetch(key, window)
                .await
                .map_err(anyhow::Error::from)
        })
        .await
        .map_err(|e| AcquireError::new(e.to_string()))
    }
}
