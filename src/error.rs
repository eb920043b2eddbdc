//! Error taxonomy shared by the manager and the provider adapters.
//!
//! Two top-level categories: [`ConfigurationError`] for failures that are
//! resolvable locally (no key, no model, key judged invalid) and
//! [`NetworkError`] for classified provider HTTP failures. Nothing in here
//! retries; `is_retryable` is a hint for the caller.

use std::time::Duration;

use thiserror::Error;

use crate::catalog::Provider;

/// Primary error type for text processing and validation round trips.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Failures detected before any request leaves the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("No API key configured")]
    MissingApiKey,

    #[error("The API key for {0} was rejected")]
    InvalidApiKey(Provider),

    #[error("No model selected")]
    MissingConfiguration,
}

/// Classified provider HTTP failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    #[error("{0} rejected the request as unauthorized")]
    Unauthorized(Provider),

    #[error("Rate limited{}", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("Server error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {}s", d.as_secs()),
        None => String::new(),
    }
}

impl CoreError {
    /// Whether the failure could plausibly succeed on a later attempt.
    /// The core never retries; this is surfaced for the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(NetworkError::RateLimited { .. })
                | Self::Network(NetworkError::ServerError { .. })
        )
    }

    /// Retry-after hint, when the provider supplied one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Network(NetworkError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, CoreError>;
