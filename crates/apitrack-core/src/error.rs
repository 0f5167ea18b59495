//! Unified error handling for apitrack-core

use thiserror::Error;

use crate::services::rate_limit::FetchError;

/// Core error type for apitrack-core
///
/// Per-bucket data problems are never reported through this type; they are
/// carried as [`UsageFailure`](crate::services::usage::UsageFailure) values.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Rate limit fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing state: {0}")]
    MissingState(String),

    #[error("Corrupt state: {0}")]
    CorruptState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for apitrack-core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a missing state error
    pub fn missing_state(msg: impl Into<String>) -> Self {
        Error::MissingState(msg.into())
    }

    /// Create a corrupt state error
    pub fn corrupt_state(msg: impl Into<String>) -> Self {
        Error::CorruptState(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("GitHub token is required");
        assert_eq!(err.to_string(), "Configuration error: GitHub token is required");
    }

    #[test]
    fn test_fetch_error_conversion() {
        let err: Error = FetchError::MissingToken.into();
        assert!(matches!(err, Error::Fetch(FetchError::MissingToken)));
        assert_eq!(err.to_string(), "Rate limit fetch failed: No GitHub token provided");
    }

    #[test]
    fn test_state_errors() {
        assert_eq!(
            Error::missing_state("starting_rate_limits").to_string(),
            "Missing state: starting_rate_limits"
        );
        assert_eq!(
            Error::corrupt_state("starting_rate_limits").to_string(),
            "Corrupt state: starting_rate_limits"
        );
    }
}
