//! Post command
//!
//! Computes usage since the starting snapshot, publishes it through the
//! GitHub Actions output files, and prints the summary to the terminal.

use anyhow::Result;
use apitrack_core::services::usage::SUMMARY_HEADING;
use apitrack_core::{PhaseOutcome, PostReport, Summary};

use super::{run_phase, Context, Phase};
use crate::output::{print_info, print_json, render_summary_table, OutputFormat};

pub async fn execute(ctx: &Context) -> Result<()> {
    let Some(PhaseOutcome::Reported(report)) = run_phase(ctx, Phase::Post).await else {
        return Ok(());
    };
    print_report(ctx, &report)
}

fn print_report(ctx: &Context, report: &PostReport) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => print_json(&report.output),
        OutputFormat::Table => {
            print_info(&summary_text(&report.summary), ctx.quiet);
            Ok(())
        }
    }
}

/// Plain-text rendering of the summary for the terminal
fn summary_text(summary: &Summary) -> String {
    let mut lines = vec![SUMMARY_HEADING.to_string()];
    lines.push(render_summary_table(&summary.table));
    lines.extend(summary.sections.iter().map(|section| section.to_string()));
    lines.join("\n")
}
