//! Checkpoint command

use anyhow::Result;
use apitrack_core::PhaseOutcome;

use super::{run_phase, Context, Phase};
use crate::output::print_success;

pub async fn execute(ctx: &Context) -> Result<()> {
    if let Some(PhaseOutcome::Completed) = run_phase(ctx, Phase::Checkpoint).await {
        print_success("Checkpoint snapshot saved", ctx.quiet);
    }
    Ok(())
}
