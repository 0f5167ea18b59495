//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod buckets;
pub mod checkpoint;
pub mod post;
pub mod pre;
pub mod snapshot;

use std::path::PathBuf;

use anyhow::Result;
use apitrack_core::db::get_db_path;
use apitrack_core::{
    run_checkpoint, run_post, run_pre, Database, Error, FetchError, GitHubActionsSink,
    GitHubRateLimitClient, PhaseContext, PhaseOutcome, SqliteStateStore, SystemClock,
    TrackerConfig,
};

use crate::output::OutputFormat;

/// Shared context for all commands
pub struct Context {
    pub config: TrackerConfig,
    pub format: OutputFormat,
    pub quiet: bool,
    pub state_db: Option<String>,
    pub job_id: String,
    pub api_url: String,
}

impl Context {
    /// Rate limit client for the configured API root and token
    pub fn client(&self) -> GitHubRateLimitClient {
        GitHubRateLimitClient::new(self.config.token.clone()).with_base_url(&self.api_url)
    }

    /// Open the state store for this job
    pub async fn open_store(&self) -> Result<SqliteStateStore> {
        let path = match self.state_db.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => PathBuf::from(shellexpand::tilde(path).into_owned()),
            _ => get_db_path(),
        };
        log::debug!(
            "[apitrack] State database {} for job {}",
            path.display(),
            self.job_id
        );
        let db = Database::open(path).await?;
        Ok(SqliteStateStore::new(&db, self.job_id.clone()))
    }
}

/// A job phase the CLI can run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Checkpoint,
    Post,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Pre => "pre",
            Phase::Checkpoint => "checkpoint",
            Phase::Post => "post",
        }
    }
}

/// Run one job phase against the real collaborators
///
/// Phase failures are logged rather than returned so the host job is never
/// failed by the tracker; `None` means the phase failed.
pub async fn run_phase(ctx: &Context, phase: Phase) -> Option<PhaseOutcome> {
    let store = match ctx.open_store().await {
        Ok(store) => store,
        Err(e) => {
            log::error!("[apitrack:{}] Failed to open state store: {}", phase.name(), e);
            return None;
        }
    };
    let client = ctx.client();
    let clock = SystemClock;
    let sink = GitHubActionsSink::from_env();
    let phase_ctx = PhaseContext {
        source: &client,
        store: &store,
        clock: &clock,
        sink: &sink,
    };

    let result = match phase {
        Phase::Pre => run_pre(&phase_ctx, &ctx.config).await,
        Phase::Checkpoint => run_checkpoint(&phase_ctx, &ctx.config).await,
        Phase::Post => run_post(&phase_ctx, &ctx.config).await,
    };

    match result {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            log::error!(
                "[apitrack:{}] {} step failed: {}",
                phase.name(),
                capitalize(phase.name()),
                e
            );
            if let Some(hint) = failure_hint(&e) {
                log::error!("[apitrack:{}] {}", phase.name(), hint);
            }
            None
        }
    }
}

/// Follow-up advice for a failed fetch, when there is any
pub(crate) fn fetch_hint(err: &FetchError) -> Option<&'static str> {
    if err.is_unauthorized() {
        Some("The token was rejected; check that it is valid and can read the rate limit API")
    } else {
        None
    }
}

fn failure_hint(err: &Error) -> Option<&'static str> {
    match err {
        Error::Fetch(fetch) => fetch_hint(fetch),
        _ => None,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::Pre.name(), "pre");
        assert_eq!(Phase::Checkpoint.name(), "checkpoint");
        assert_eq!(Phase::Post.name(), "post");
    }

    #[test]
    fn test_failure_hint_only_for_rejected_tokens() {
        for status in [401, 403] {
            let err = Error::Fetch(FetchError::Api {
                status,
                body: String::new(),
            });
            assert!(failure_hint(&err).unwrap().contains("token was rejected"));
        }

        let server_error = Error::Fetch(FetchError::Api {
            status: 500,
            body: "boom".to_string(),
        });
        assert_eq!(failure_hint(&server_error), None);
        assert_eq!(
            failure_hint(&Error::Fetch(FetchError::Network("refused".to_string()))),
            None
        );
        assert_eq!(
            failure_hint(&Error::missing_state("No starting rate limit data found")),
            None
        );
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("post"), "Post");
        assert_eq!(capitalize(""), "");
    }
}
