//! Buckets command
//!
//! Lists every bucket identifier that can be tracked.

use anyhow::Result;
use apitrack_core::Bucket;
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::print_output;

/// Bucket row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct BucketRow {
    #[tabled(rename = "Bucket")]
    pub bucket: String,
    #[tabled(rename = "Selected")]
    pub selected: bool,
}

fn bucket_rows(selected: &[Bucket]) -> Vec<BucketRow> {
    Bucket::ALL
        .iter()
        .map(|bucket| BucketRow {
            bucket: bucket.to_string(),
            selected: selected.contains(bucket),
        })
        .collect()
}

pub fn execute(ctx: &Context) -> Result<()> {
    print_output(&bucket_rows(&ctx.config.buckets), ctx.format)
}
