//! Rate limit snapshot sources
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ trait RateLimitSource                       │
//! │   - fetch_snapshot() -> RateLimitSnapshot   │
//! └─────────────────────────────────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────────────┐
//! │ GitHubRateLimitClient (reqwest)             │
//! │   GET {api}/rate_limit, bearer token, 30s   │
//! └─────────────────────────────────────────────┘
//! ```

pub mod github;
pub mod provider;

pub use github::{GitHubRateLimitClient, DEFAULT_API_URL, REQUEST_TIMEOUT_MS};
pub use provider::{FetchError, RateLimitSource};
