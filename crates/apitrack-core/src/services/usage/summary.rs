//! Summary builder
//!
//! Turns an aggregate report into a results table and narrative lines. The
//! same [`Summary`] feeds the terminal output and the job summary markdown.

use serde::Serialize;

use super::processor::BucketData;
use super::types::Bucket;

/// Heading used for the job summary
pub const SUMMARY_HEADING: &str = "GitHub API Usage Tracker Summary";

/// Cell text for a value that could not be determined
pub const NOT_AVAILABLE: &str = "n/a";

// ============================================================================
// Summary Types
// ============================================================================

/// Rendered results table; every cell is already text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// One narrative line below the table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SummarySection {
    /// Buckets whose reset boundary fell between the snapshots
    ResetCrossed { buckets: Vec<String> },
    /// States that the total below is not exact
    InexactTotal,
    /// Lower bound on calls used
    MinimumUsed { used: i64 },
    /// Exact calls used
    TotalUsed { used: i64 },
    /// Elapsed job time in milliseconds, if known
    Duration { millis: Option<i64> },
}

impl SummarySection {
    pub fn label(&self) -> &'static str {
        match self {
            SummarySection::ResetCrossed { .. } => "Reset Window Crossed",
            SummarySection::InexactTotal => "Note",
            SummarySection::MinimumUsed { .. } => "Minimum API Calls/Points Used",
            SummarySection::TotalUsed { .. } => "Total API Calls/Points Used",
            SummarySection::Duration { .. } => "Action Duration",
        }
    }

    pub fn value(&self) -> String {
        match self {
            SummarySection::ResetCrossed { buckets } => format!("Yes ({})", buckets.join(", ")),
            SummarySection::InexactTotal => {
                "A reset window was crossed, so total usage cannot be computed exactly; \
                 the figure below is a minimum"
                    .to_string()
            }
            SummarySection::MinimumUsed { used } | SummarySection::TotalUsed { used } => {
                used.to_string()
            }
            SummarySection::Duration { millis } => match millis {
                Some(ms) if *ms >= 0 => format_duration(*ms),
                _ => "Unknown".to_string(),
            },
        }
    }
}

impl std::fmt::Display for SummarySection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.label(), self.value())
    }
}

/// Table plus narrative for one post-phase run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub table: SummaryTable,
    pub sections: Vec<SummarySection>,
}

impl Summary {
    /// Render as GitHub-flavoured markdown for the job summary page
    pub fn to_markdown(&self) -> String {
        let mut out = format!("## {}\n\n", SUMMARY_HEADING);

        out.push_str(&markdown_row(&self.table.header));
        out.push_str(&markdown_row(
            &self.table.header.iter().map(|_| "---".to_string()).collect::<Vec<_>>(),
        ));
        for row in &self.table.rows {
            out.push_str(&markdown_row(row));
        }
        out.push('\n');

        for section in &self.sections {
            out.push_str(&format!("**{}:** {}\n\n", section.label(), section.value()));
        }
        out
    }
}

fn markdown_row(cells: &[String]) -> String {
    let escaped: Vec<String> = cells.iter().map(|c| c.replace('|', "\\|")).collect();
    format!("| {} |\n", escaped.join(" | "))
}

// ============================================================================
// Builders
// ============================================================================

/// Format a count for a table cell
pub fn format_cell(value: Option<i64>) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| v.to_string())
}

/// Format milliseconds as `Ns`, `Nm Ss` or `Nh Mm Ss`, flooring every unit
pub fn format_duration(ms: i64) -> String {
    let seconds = ms.max(0) / 1000;
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    let minutes = seconds / 60;
    let secs = seconds % 60;
    if minutes < 60 {
        return format!("{}m {}s", minutes, secs);
    }
    let hours = minutes / 60;
    let mins = minutes % 60;
    format!("{}h {}m {}s", hours, mins, secs)
}

/// Build the results table
///
/// The last column reads "Used (Minimum)" when any bucket crossed its reset.
pub fn build_table(data: &BucketData, use_minimum_header: bool) -> SummaryTable {
    let total_header = if use_minimum_header {
        "Used (Minimum)"
    } else {
        "Used (Total)"
    };
    let header = [
        "Bucket",
        "Used (Start)",
        "Remaining (Start)",
        "Used (End)",
        "Remaining (End)",
        total_header,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let rows = data
        .iter()
        .map(|(bucket, entry)| {
            vec![
                bucket.to_string(),
                format_cell(entry.used.start),
                format_cell(entry.remaining.start),
                format_cell(entry.used.end),
                format_cell(entry.remaining.end),
                format_cell(Some(entry.used.total)),
            ]
        })
        .collect();

    SummaryTable { header, rows }
}

/// Build the table and narrative sections for a finished run
pub fn build_summary(
    data: &BucketData,
    crossed_buckets: &[Bucket],
    total_used: i64,
    duration_ms: Option<i64>,
) -> Summary {
    let crossed = !crossed_buckets.is_empty();
    let table = build_table(data, crossed);

    let mut sections = Vec::new();
    if crossed {
        sections.push(SummarySection::ResetCrossed {
            buckets: crossed_buckets.iter().map(|b| b.to_string()).collect(),
        });
        sections.push(SummarySection::InexactTotal);
        sections.push(SummarySection::MinimumUsed { used: total_used });
    } else {
        sections.push(SummarySection::TotalUsed { used: total_used });
    }
    sections.push(SummarySection::Duration {
        millis: duration_ms,
    });

    Summary { table, sections }
}

// ============================================================================
// Tests
// ============================================================================
