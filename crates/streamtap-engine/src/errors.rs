//! Engine error model and retry backoff policy helpers.

use std::time::Duration;

use streamtap_types::error::{BackoffClass, ConnectorError};

const BACKOFF_FAST_BASE_MS: u64 = 100;
const BACKOFF_NORMAL_BASE_MS: u64 = 1_000;
const BACKOFF_SLOW_BASE_MS: u64 = 5_000;
const BACKOFF_MAX_MS: u64 = 60_000;

/// Categorized engine error for retry decisions.
///
/// `Connector` wraps a typed `ConnectorError` with retry metadata
/// (`retryable`, `backoff_class`).
///
/// `Infrastructure` wraps opaque host-side errors (offset store, sink,
/// config decoding) that are never retried.
#[derive(Debug)]
pub enum EngineError {
    /// Typed task error with retry metadata.
    Connector(ConnectorError),
    /// Host-side failure (state backend, sink I/O, etc.)
    Infrastructure(anyhow::Error),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connector(e) => write!(f, "{e}"),
            Self::Infrastructure(e) => write!(f, "{e:#}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<anyhow::Error> for EngineError {
    fn from(e: anyhow::Error) -> Self {
        Self::Infrastructure(e)
    }
}

impl From<ConnectorError> for EngineError {
    fn from(e: ConnectorError) -> Self {
        Self::Connector(e)
    }
}

impl EngineError {
    /// Returns `true` if this is a typed connector error that the task has
    /// marked as retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connector(e) => e.retryable,
            Self::Infrastructure(_) => false,
        }
    }

    /// Returns the typed connector error if this is a `Connector` variant.
    pub fn as_connector_error(&self) -> Option<&ConnectorError> {
        match self {
            Self::Connector(e) => Some(e),
            Self::Infrastructure(_) => None,
        }
    }
}

/// Compute retry delay from the error's backoff class and attempt number
/// (1-based).
pub fn compute_backoff(err: &ConnectorError, attempt: u32) -> Duration {
    let base_ms: u64 = match err.backoff_class {
        BackoffClass::Fast => BACKOFF_FAST_BASE_MS,
        BackoffClass::Normal => BACKOFF_NORMAL_BASE_MS,
        BackoffClass::Slow => BACKOFF_SLOW_BASE_MS,
    };

    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    let delay_ms = base_ms.saturating_mul(factor);
    Duration::from_millis(delay_ms.min(BACKOFF_MAX_MS))
}
