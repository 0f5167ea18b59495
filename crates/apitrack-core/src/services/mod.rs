//! Services module

pub mod clock;
pub mod output;
pub mod phases;
pub mod rate_limit;
pub mod state;
pub mod usage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use output::{write_output_file, GitHubActionsSink, MemorySink, OutputSink};
pub use phases::{
    run_checkpoint, run_post, run_pre, PhaseContext, PhaseOutcome, PostReport, UsageOutput,
};
pub use rate_limit::{FetchError, GitHubRateLimitClient, RateLimitSource};
pub use state::{MemoryStateStore, SqliteStateStore, StateKey, StateStore};
pub use usage::{
    build_summary, compute_usage, process_buckets, AggregateReport, Bucket, BucketData,
    BucketOutcome, BucketReportEntry, BucketSnapshot, ProcessRequest, RateLimitSnapshot,
    Resources, Summary, SummarySection, SummaryTable, UsageFailure, UsageResult, UsageWarning,
};
