//! Pre command
//!
//! Captures the starting snapshot at the beginning of a job.

use anyhow::Result;
use apitrack_core::PhaseOutcome;

use super::{run_phase, Context, Phase};
use crate::output::print_success;

pub async fn execute(ctx: &Context) -> Result<()> {
    if let Some(PhaseOutcome::Completed) = run_phase(ctx, Phase::Pre).await {
        print_success(
            &format!("Starting snapshot saved for job {}", ctx.job_id),
            ctx.quiet,
        );
    }
    Ok(())
}
