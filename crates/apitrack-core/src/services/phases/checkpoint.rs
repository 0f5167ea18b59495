//! Checkpoint phase: capture an optional mid-job snapshot

use super::{log_snapshot, skip_requested, PhaseContext, PhaseOutcome};
use crate::config::TrackerConfig;
use crate::error::Result;
use crate::services::state::StateKey;

const SKIP_MESSAGE: &str = "Skipping checkpoint snapshot due to missing token";

/// Capture and persist a checkpoint snapshot
///
/// Running this more than once keeps only the latest checkpoint.
pub async fn run_checkpoint(
    ctx: &PhaseContext<'_>,
    config: &TrackerConfig,
) -> Result<PhaseOutcome> {
    if !config.has_token() || skip_requested(ctx.store).await? {
        log::info!("[apitrack:checkpoint] {}", SKIP_MESSAGE);
        return Ok(PhaseOutcome::skipped(SKIP_MESSAGE));
    }

    log::info!("[apitrack:checkpoint] Fetching checkpoint rate limits...");
    let snapshot = ctx.source.fetch_snapshot().await?;
    // Taken after the response: a checkpoint dated before the reset must hold
    // old-window counters.
    let checkpoint_time = ctx.clock.now_millis();
    log_snapshot("checkpoint", "Checkpoint", &snapshot.resources);

    ctx.store
        .save(StateKey::CheckpointTime, &checkpoint_time.to_string())
        .await?;
    ctx.store
        .save(
            StateKey::CheckpointRateLimits,
            &serde_json::to_string(&snapshot.resources)?,
        )
        .await?;

    log::info!("[apitrack:checkpoint] Saved checkpoint snapshot");
    Ok(PhaseOutcome::Completed)
}
