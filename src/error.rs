//! Error types for mek-verify.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the verification engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded, parsed, or is incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An indexer answered, but not with something usable.
    #[error("{provider} error: {message}")]
    Provider {
        /// Provider name.
        provider: &'static str,
        /// What went wrong.
        message: String,
    },

    /// An indexer did not answer within its deadline.
    #[error("{provider} query timed out after {}ms", after.as_millis())]
    Timeout {
        /// Provider name.
        provider: &'static str,
        /// The deadline that elapsed.
        after: Duration,
    },

    /// A stake address could not be normalized.
    #[error("Invalid stake address: {0}")]
    Address(String),

    /// The ownership store rejected a read or write.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl Error {
    /// Shorthand for a provider error.
    pub(crate) fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
        }
    }
}
