//! Unified error handling for the marquee crate
//!
//! Domain-specific errors (lease store, acquirer) live next to their
//! modules; this module folds them into a single [`Error`] enum usable
//! across module boundaries, with a category and a recoverability hint
//! for callers deciding between retry and abort.

use std::io;
use thiserror::Error;

pub use crate::acquire::AcquireError;
pub use crate::lease::store::StoreError;

/// Common interface implemented by marquee error types
pub trait MarqueeError: std::error::Error {
    /// Whether the operation may succeed on a later attempt or cycle
    fn is_recoverable(&self) -> bool;

    /// The error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Lease/coordination failures
    Coordination,
    /// External acquirer failures
    Acquisition,
    /// Persistent store and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

/// Unified error type for the marquee crate
#[derive(Error, Debug)]
pub enum Error {
    /// Lease or listing store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// External acquirer errors
    #[error("Acquire error: {0}")]
    Acquire(#[from] AcquireError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl MarqueeError for StoreError {
    fn is_recoverable(&self) -> bool {
        // The store being unreachable is fatal for the current invocation;
        // the external scheduler retries on the next cycle.
        false
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Storage
    }
}

impl MarqueeError for AcquireError {
    fn is_recoverable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Acquisition
    }
}

impl MarqueeError for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_recoverable(),
            Self::Acquire(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Store(e) => e.category(),
            Self::Acquire(e) => e.category(),
            Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Storage,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other {
            context: err.to_string(),
            source: None,
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
