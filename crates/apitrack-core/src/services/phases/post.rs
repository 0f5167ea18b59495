//! Post phase: compute and publish usage
//!
//! Loads the starting (and optional checkpoint) snapshot, takes the ending
//! snapshot, and runs the usage engine over the configured buckets.

use serde::Serialize;

use super::{skip_requested, PhaseContext, PhaseOutcome};
use crate::config::TrackerConfig;
use crate::error::{Error, Result};
use crate::services::clock::millis_to_seconds;
use crate::services::output::write_output_file;
use crate::services::state::{StateKey, StateStore};
use crate::services::usage::{
    build_summary, process_buckets, Bucket, BucketData, ProcessRequest, Resources, Summary,
};

/// Name of the step output carrying the usage JSON
pub const USAGE_OUTPUT_NAME: &str = "usage";

// ============================================================================
// Output Types
// ============================================================================

/// The published usage document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageOutput {
    /// Sum of per-bucket usage; a minimum when `crossed_reset` is set
    pub total: i64,
    /// Elapsed milliseconds since the starting snapshot, `null` when unknown
    pub duration_ms: Option<i64>,
    pub buckets_data: BucketData,
    pub crossed_reset: bool,
}

/// Everything a post run produced
#[derive(Debug, Clone, PartialEq)]
pub struct PostReport {
    pub output: UsageOutput,
    pub summary: Summary,
    pub crossed_buckets: Vec<Bucket>,
    /// Per-bucket warnings and advisory notes, in bucket order
    pub warnings: Vec<String>,
}

// ============================================================================
// State Loading
// ============================================================================

/// Checkpoint snapshot and its time in epoch seconds
struct Checkpoint {
    resources: Resources,
    time_seconds: i64,
}

async fn load_starting(store: &dyn StateStore) -> Result<Resources> {
    let raw = store
        .load(StateKey::StartingRateLimits)
        .await?
        .ok_or_else(|| {
            Error::missing_state("No starting rate limit data found; skipping post step")
        })?;

    serde_json::from_str(&raw).map_err(|e| {
        log::debug!("[apitrack:post] Starting state parse error: {}", e);
        Error::corrupt_state("Failed to parse starting rate limit data; skipping post step")
    })
}

async fn load_millis(store: &dyn StateStore, key: StateKey) -> Result<Option<i64>> {
    Ok(store
        .load(key)
        .await?
        .and_then(|raw| raw.trim().parse::<i64>().ok()))
}

/// Load the checkpoint, dropping it with a warning when unusable
async fn load_checkpoint(store: &dyn StateStore) -> Result<Option<Checkpoint>> {
    let Some(raw) = store.load(StateKey::CheckpointRateLimits).await? else {
        return Ok(None);
    };

    let resources: Resources = match serde_json::from_str(&raw) {
        Ok(resources) => resources,
        Err(e) => {
            log::warn!(
                "[apitrack:post] Failed to parse checkpoint rate limit data; ignoring checkpoint snapshot"
            );
            log::debug!("[apitrack:post] Checkpoint state parse error: {}", e);
            return Ok(None);
        }
    };

    let Some(time_millis) = load_millis(store, StateKey::CheckpointTime).await? else {
        log::warn!(
            "[apitrack:post] Invalid or missing checkpoint time; ignoring checkpoint snapshot"
        );
        return Ok(None);
    };

    Ok(Some(Checkpoint {
        resources,
        time_seconds: millis_to_seconds(time_millis),
    }))
}

// ============================================================================
// Phase
// ============================================================================

/// Compute usage since the starting snapshot and publish it
///
/// Missing or unparseable starting state is an error raised before any fetch.
/// A missing start time or an unusable checkpoint only degrades the result.
pub async fn run_post(ctx: &PhaseContext<'_>, config: &TrackerConfig) -> Result<PhaseOutcome> {
    if skip_requested(ctx.store).await? {
        log::info!("[apitrack:post] Skipping post step due to missing token");
        return Ok(PhaseOutcome::skipped("missing token"));
    }

    if config.buckets.is_empty() {
        log::info!("[apitrack:post] No valid buckets specified for tracking");
        return Ok(PhaseOutcome::skipped("no valid buckets"));
    }

    let starting = load_starting(ctx.store).await?;

    let start_time = load_millis(ctx.store, StateKey::StartTime).await?;
    if start_time.is_none() {
        log::error!(
            "[apitrack:post] Invalid or missing start time; duration will be reported as unknown"
        );
    }

    let checkpoint = load_checkpoint(ctx.store).await?;

    // Taken before the request: an ending response fetched after the reset
    // but dated before it is rejected or undercounted, never overcounted.
    let end_time = ctx.clock.now_millis();
    let duration_ms = match start_time.map(|start| end_time.saturating_sub(start)) {
        Some(ms) if ms < 0 => {
            log::warn!(
                "[apitrack:post] Start time is after end time; duration will be reported as unknown"
            );
            None
        }
        other => other,
    };

    log::info!("[apitrack:post] Fetching final rate limits...");
    let ending = ctx.source.fetch_snapshot().await?;

    let request = ProcessRequest {
        buckets: &config.buckets,
        starting: &starting,
        ending: &ending.resources,
        checkpoint: checkpoint.as_ref().map(|c| &c.resources),
        end_time_seconds: millis_to_seconds(end_time),
        checkpoint_time_seconds: checkpoint.as_ref().map(|c| c.time_seconds),
    };
    let report = process_buckets(&request);

    for warning in &report.warnings {
        log::warn!("[apitrack:post] {}", warning);
    }

    let summary = build_summary(
        &report.data,
        &report.crossed_buckets,
        report.total_used,
        duration_ms,
    );

    let output = UsageOutput {
        total: report.total_used,
        duration_ms,
        crossed_reset: report.crossed_reset(),
        buckets_data: report.data,
    };

    ctx.sink
        .set_output(USAGE_OUTPUT_NAME, &serde_json::to_string(&output)?)?;

    if let Some(path) = &config.output_path {
        write_output_file(path, &output)?;
    }

    ctx.sink.write_summary(&summary.to_markdown())?;

    log::info!(
        "[apitrack:post] {} API calls/points used across {} buckets",
        output.total,
        output.buckets_data.len()
    );

    Ok(PhaseOutcome::Reported(Box::new(PostReport {
        output,
        summary,
        crossed_buckets: report.crossed_buckets,
        warnings: report.warnings,
    })))
}

// ============================================================================
// Tests
// ============================================================================
