//! Usage computation engine
//!
//! Pure, synchronous pipeline from snapshots to a rendered summary:
//!
//! ```text
//! starting / checkpoint / ending snapshots
//!          │
//!          ▼
//! compute_usage()        per bucket, UsageResult
//!          │
//!          ▼
//! process_buckets()      BucketOutcome per bucket, folded into AggregateReport
//!          │
//!          ▼
//! build_summary()        SummaryTable + SummarySection lines
//! ```

pub mod calculator;
pub mod processor;
pub mod summary;
pub mod types;

pub use calculator::compute_usage;
pub use processor::{
    evaluate_bucket, evaluate_buckets, process_buckets, AggregateReport, BucketData,
    BucketOutcome, BucketReportEntry, ProcessRequest, RemainingCounts, UsedCounts,
};
pub use summary::{
    build_summary, build_table, format_cell, format_duration, Summary, SummarySection,
    SummaryTable, NOT_AVAILABLE, SUMMARY_HEADING,
};
pub use types::{
    Bucket, BucketSnapshot, RateLimitSnapshot, Resources, UsageFailure, UsageResult,
    UsageWarning,
};
