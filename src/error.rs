//! Hermod error types

use std::time::Duration;

/// Hermod error types
#[derive(Debug, thiserror::Error)]
pub enum HermodError {
    // Upstream/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out")]
    Timeout,

    #[error("empty response from model")]
    EmptyResponse,

    // Data errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("validation failed: {0}")]
    Validation(String),

    // Cache errors
    #[error("cache error: {0}")]
    Cache(String),

    /// `add` found a live entry with the same composite-key hash.
    #[error("cache entry already exists for this key")]
    DuplicateEntry,

    #[error("unsupported cache backend: {0}")]
    UnsupportedBackend(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl HermodError {
    /// Whether a retry may succeed.
    ///
    /// Network failures, timeouts, rate limits, and upstream 5xx responses
    /// are transient; everything else is permanent and never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            HermodError::Http(_) | HermodError::Timeout | HermodError::RateLimited { .. } => true,
            HermodError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Upstream `Retry-After` hint, when one was provided.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            HermodError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for Hermod operations
pub type Result<T> = std::result::Result<T, HermodError>;
