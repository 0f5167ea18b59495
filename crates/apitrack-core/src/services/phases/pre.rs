//! Pre phase: capture the starting snapshot

use super::{log_snapshot, PhaseContext, PhaseOutcome};
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::services::state::StateKey;

/// Error logged when the job runs without a token
pub const MISSING_TOKEN_MESSAGE: &str = "GitHub token is required for API Usage Tracker";

/// Capture and persist the starting snapshot
///
/// Any state left behind by an earlier run of the same job is cleared first.
/// Without a token nothing is fetched and `skip_post` is recorded so the
/// later phases stand down.
pub async fn run_pre(ctx: &PhaseContext<'_>, config: &TrackerConfig) -> Result<PhaseOutcome> {
    ctx.store.clear().await?;

    if !config.has_token() {
        log::error!("[apitrack:pre] {}", MISSING_TOKEN_MESSAGE);
        ctx.store.save(StateKey::SkipPost, "true").await?;
        return Ok(PhaseOutcome::skipped(MISSING_TOKEN_MESSAGE));
    }
    ctx.store.save(StateKey::SkipPost, "false").await?;

    let start_time = ctx.clock.now_millis();
    log::info!(
        "[apitrack:pre] Fetching starting rate limits from {}...",
        ctx.source.source_id()
    );
    let snapshot = ctx.source.fetch_snapshot().await?;
    log_snapshot("pre", "Starting", &snapshot.resources);

    ctx.store
        .save(StateKey::StartTime, &start_time.to_string())
        .await?;
    ctx.store
        .save(
            StateKey::StartingRateLimits,
            &serde_json::to_string(&snapshot.resources)?,
        )
        .await?;

    log::info!(
        "[apitrack:pre] Saved starting snapshot with {} resources",
        snapshot.resources.len()
    );
    Ok(PhaseOutcome::Completed)
}
