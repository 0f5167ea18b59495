//! GitHub rate limit source
//!
//! Implements [`RateLimitSource`] against the REST endpoint
//! `GET /rate_limit`, which reports every resource bucket at once and does
//! not itself count against the core limit.
//!
//! # Example
//!
//! ```ignore
//! use apitrack_core::services::rate_limit::{GitHubRateLimitClient, RateLimitSource};
//!
//! let client = GitHubRateLimitClient::new(Some(token));
//! let snapshot = client.fetch_snapshot().await?;
//! for (name, bucket) in &snapshot.resources {
//!     println!("{}: {:?} remaining", name, bucket.remaining);
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::provider::{FetchError, RateLimitSource};
use crate::services::usage::RateLimitSnapshot;

// ============================================================================
// Constants
// ============================================================================

/// Public GitHub REST API root
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// HTTP request timeout in milliseconds
pub const REQUEST_TIMEOUT_MS: u64 = 30_000;

const USER_AGENT: &str = "github-api-usage-tracker";

const ACCEPT: &str = "application/vnd.github+json";

const API_VERSION: &str = "2022-11-28";

// ============================================================================
// GitHubRateLimitClient
// ============================================================================

/// Fetches rate limit snapshots from the GitHub REST API
pub struct GitHubRateLimitClient {
    client: Client,
    token: Option<String>,
    base_url: String,
    timeout_ms: u64,
}

impl GitHubRateLimitClient {
    /// Create a client for the public API
    ///
    /// An empty token is treated as no token.
    pub fn new(token: Option<String>) -> Self {
        Self::with_timeout(token, Duration::from_millis(REQUEST_TIMEOUT_MS))
    }

    /// Create a client with a custom request timeout
    pub fn with_timeout(token: Option<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            token: token.filter(|t| !t.trim().is_empty()),
            base_url: DEFAULT_API_URL.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Point the client at a different API root (GitHub Enterprise Server)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Whether a token is configured
    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}/rate_limit", self.base_url)
    }

    fn map_send_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout_ms)
        } else {
            err.into()
        }
    }
}

#[async_trait]
impl RateLimitSource for GitHubRateLimitClient {
    fn source_id(&self) -> &'static str {
        "github"
    }

    async fn fetch_snapshot(&self) -> Result<RateLimitSnapshot, FetchError> {
        let token = self.token.as_deref().ok_or(FetchError::MissingToken)?;

        log::debug!("[apitrack:github] GET {}", self.endpoint());

        let response = self
            .client
            .get(self.endpoint())
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", ACCEPT)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        log::info!("[apitrack:github] GitHub API response: {}", status.as_u16());

        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            log::error!("[apitrack:github] API error: HTTP {} - {}", status, body);
            return Err(FetchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let snapshot: RateLimitSnapshot = serde_json::from_str(&body).map_err(|e| {
            log::error!("[apitrack:github] Failed to parse rate limit response: {}", e);
            FetchError::Parse(format!("Invalid rate limit response: {}", e))
        })?;

        log::debug!(
            "[apitrack:github] Snapshot contains {} resources",
            snapshot.resources.len()
        );
        Ok(snapshot)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::usage::Bucket;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Client that talks to the loopback test server directly, ignoring proxy env vars
    fn local_client(base_url: &str) -> GitHubRateLimitClient {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        GitHubRateLimitClient {
            client,
            token: Some("token123".to_string()),
            base_url: base_url.to_string(),
            timeout_ms: 5_000,
        }
    }

    /// Serve one canned HTTP response and hand back the raw request text
    async fn serve_once(status_line: &str, body: &str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        );
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            let _ = tx.send(String::from_utf8_lossy(&request).to_string());
        });

        (format!("http://{}", addr), rx)
    }

    #[tokio::test]
    async fn test_missing_token_fails_without_request() {
        let client = GitHubRateLimitClient::new(Some("   ".to_string()))
            .with_base_url("http://127.0.0.1:9");
        assert!(!client.has_token());

        let err = client.fetch_snapshot().await.unwrap_err();
        assert!(matches!(err, FetchError::MissingToken));
    }

    #[tokio::test]
    async fn test_fetch_parses_snapshot_and_sends_headers() {
        let body = r#"{"resources":{"core":{"limit":5000,"used":1,"remaining":4999,"reset":1700000000}}}"#;
        let (url, request_rx) = serve_once("200 OK", body).await;

        let client = local_client(&url);
        let snapshot = client.fetch_snapshot().await.unwrap();

        let core = snapshot.bucket(Bucket::Core).unwrap();
        assert_eq!(core.remaining, Some(4999));
        assert_eq!(core.used, Some(1));

        let request = request_rx.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /rate_limit "));
        assert!(request.contains("authorization: bearer token123"));
        assert!(request.contains("user-agent: github-api-usage-tracker"));
        assert!(request.contains("accept: application/vnd.github+json"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let (url, _rx) = serve_once("401 Unauthorized", "nope").await;

        let client = local_client(&url);
        let err = client.fetch_snapshot().await.unwrap_err();

        assert_eq!(err.to_string(), "GitHub API returned 401: nope");
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_invalid_json_is_parse_error() {
        let (url, _rx) = serve_once("200 OK", "not-json").await;

        let client = local_client(&url);
        let err = client.fetch_snapshot().await.unwrap_err();

        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = local_client(&format!("http://{}", addr));
        let err = client.fetch_snapshot().await.unwrap_err();

        assert!(matches!(err, FetchError::Network(_)));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = GitHubRateLimitClient::new(None).with_base_url("https://ghe.example.com/api/v3/");
        assert_eq!(client.endpoint(), "https://ghe.example.com/api/v3/rate_limit");
    }

    #[test]
    fn test_source_id() {
        let client = GitHubRateLimitClient::new(None);
        assert_eq!(client.source_id(), "github");
    }
}
