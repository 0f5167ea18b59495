//! Rate limit source trait and error types
//!
//! Defines the interface the phases use to take a snapshot of the
//! provider's rate limit counters.

use async_trait::async_trait;
use thiserror::Error;

use crate::services::usage::RateLimitSnapshot;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when fetching a rate limit snapshot
#[derive(Error, Debug)]
pub enum FetchError {
    /// No token was configured
    #[error("No GitHub token provided")]
    MissingToken,

    /// The API answered with a non-2xx status
    #[error("GitHub API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The response body was not a rate limit document
    #[error("Parse error: {0}")]
    Parse(String),

    /// The request did not complete within the timeout
    #[error("GitHub API request timed out after {0}ms")]
    Timeout(u64),

    /// Network request failed
    #[error("Network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Whether the API rejected the credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, FetchError::Api { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            FetchError::Api {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Parse(err.to_string())
    }
}

// ============================================================================
// Source Trait
// ============================================================================

/// Something that can produce a point-in-time rate limit snapshot
///
/// Each call is a single attempt. Implementations bound their own latency
/// and report a timeout as an ordinary [`FetchError`]; callers never retry.
#[async_trait]
pub trait RateLimitSource: Send + Sync {
    /// Identifier used in log lines
    fn source_id(&self) -> &'static str;

    /// Fetch the current counters for every resource bucket
    async fn fetch_snapshot(&self) -> Result<RateLimitSnapshot, FetchError>;
}

// ============================================================================
// Tests
// ============================================================================
