//! # apitrack-core
//!
//! Core logic for apitrack, a GitHub API rate limit usage tracker for CI jobs.
//!
//! This crate provides:
//! - The usage computation engine (`services::usage`)
//! - The GitHub rate limit client (`services::rate_limit`)
//! - Phase state persistence (`db`, `services::state`)
//! - The pre / checkpoint / post phases (`services::phases`)
//! - Input resolution (`config`) and unified error handling (`error`)

pub mod config;
pub mod db;
pub mod error;
pub mod services;

// Re-exports for convenience
pub use config::{parse_buckets, resolve_job_id, BucketSelection, TrackerConfig};
pub use db::Database;
pub use error::{Error, Result};

pub use services::{
    build_summary, compute_usage, process_buckets, run_checkpoint, run_post, run_pre,
    write_output_file, AggregateReport, Bucket, BucketData, BucketOutcome, BucketReportEntry,
    BucketSnapshot, Clock, FetchError, FixedClock, GitHubActionsSink, GitHubRateLimitClient,
    MemorySink, MemoryStateStore, OutputSink, PhaseContext, PhaseOutcome, PostReport,
    ProcessRequest, RateLimitSnapshot, RateLimitSource, Resources, SqliteStateStore, StateKey,
    StateStore, Summary, SummarySection, SummaryTable, SystemClock, UsageFailure, UsageOutput,
    UsageResult, UsageWarning,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_format() {
        let parts: Vec<&str> = version().split('.').collect();
        assert_eq!(parts.len(), 3, "Version should be in x.y.z format");
    }
}
