//! Bucket usage calculator
//!
//! Compares two (optionally three) observations of one rate limit bucket and
//! decides how many calls were consumed between them.
//!
//! # Reset windows
//!
//! `starting.remaining - ending.remaining` is only meaningful while both
//! observations sit in the same reset window. Once the ending observation is
//! at or past `starting.reset`, the counter has been replenished in between
//! and the old window's consumption after the starting snapshot is no longer
//! observable. In that case the result is a lower bound:
//!
//! ```text
//!   start            checkpoint        reset             end
//!     |------------------|---------------|-----------------|
//!     \___ recovered ____/   (unseen)    \__ limit - rem __/
//! ```
//!
//! A checkpoint taken before the reset recovers part of the old window's
//! usage; whatever happened between the checkpoint and the reset stays unseen.

use super::types::{BucketSnapshot, UsageFailure, UsageResult, UsageWarning};

/// Compute the usage of one bucket between two snapshots
///
/// # Arguments
/// * `starting` - Bucket from the pre-phase snapshot
/// * `ending` - Bucket from the post-phase snapshot
/// * `end_time_seconds` - Wall-clock time of the ending snapshot, epoch seconds
/// * `checkpoint` - Bucket from the optional checkpoint snapshot
/// * `checkpoint_time_seconds` - Wall-clock time of the checkpoint, epoch seconds
///
/// The first failing check decides the `reason`; nothing after it is evaluated.
pub fn compute_usage(
    starting: Option<&BucketSnapshot>,
    ending: Option<&BucketSnapshot>,
    end_time_seconds: i64,
    checkpoint: Option<&BucketSnapshot>,
    checkpoint_time_seconds: Option<i64>,
) -> UsageResult {
    let (starting, ending) = match (starting, ending) {
        (Some(s), Some(e)) => (s, e),
        _ => return UsageResult::invalid(UsageFailure::MissingBucket, false),
    };

    let (starting_remaining, ending_remaining) = match (starting.remaining, ending.remaining) {
        (Some(s), Some(e)) => (s, e),
        _ => return UsageResult::invalid(UsageFailure::InvalidRemaining, false),
    };

    let reset = starting.reset;
    let crossed_reset = reset.is_some_and(|reset| end_time_seconds >= reset);
    let mut warnings = Vec::new();

    let used = if let Some(reset) = reset.filter(|_| crossed_reset) {
        let (starting_limit, ending_limit) = match (starting.limit, ending.limit) {
            (Some(s), Some(e)) => (s, e),
            _ => return UsageResult::invalid(UsageFailure::InvalidLimit, true),
        };
        if starting_limit != ending_limit {
            warnings.push(UsageWarning::LimitChangedAcrossReset);
        }

        let since_reset = ending_limit.saturating_sub(ending_remaining);
        let before_reset = checkpoint
            .zip(checkpoint_time_seconds)
            .filter(|(_, time)| *time < reset)
            .and_then(|(cp, _)| cp.remaining)
            .map(|cp_remaining| starting_remaining.saturating_sub(cp_remaining).max(0))
            .unwrap_or(0);

        since_reset.saturating_add(before_reset)
    } else {
        if let (Some(starting_limit), Some(ending_limit)) = (starting.limit, ending.limit) {
            if starting_limit != ending_limit {
                return UsageResult::invalid(UsageFailure::LimitChangedWithoutReset, false);
            }
        }

        let used = starting_remaining.saturating_sub(ending_remaining);
        if used < 0 {
            return UsageResult::invalid(UsageFailure::RemainingIncreasedWithoutReset, false);
        }
        used
    };

    if used < 0 {
        return UsageResult::invalid(UsageFailure::NegativeUsage, crossed_reset);
    }

    UsageResult::valid(used, ending_remaining, crossed_reset, warnings)
}

// ============================================================================
// Tests
// ============================================================================
