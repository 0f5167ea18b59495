//! Snapshot command
//!
//! Fetches the current rate limits once and prints them. Nothing is saved.

use anyhow::{Context as _, Result};
use apitrack_core::services::usage::{format_cell, NOT_AVAILABLE};
use apitrack_core::{BucketSnapshot, RateLimitSource};
use chrono::{TimeZone, Utc};
use serde::Serialize;
use tabled::Tabled;

use super::{fetch_hint, Context};
use crate::output::{print_output, print_warning};

/// Snapshot row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct SnapshotRow {
    #[tabled(rename = "Bucket")]
    pub bucket: String,
    #[tabled(rename = "Limit")]
    pub limit: String,
    #[tabled(rename = "Used")]
    pub used: String,
    #[tabled(rename = "Remaining")]
    pub remaining: String,
    #[tabled(rename = "Resets At")]
    pub reset: String,
}

impl SnapshotRow {
    fn new(bucket: &str, snapshot: &BucketSnapshot) -> Self {
        Self {
            bucket: bucket.to_string(),
            limit: format_cell(snapshot.limit),
            used: format_cell(snapshot.used.or_else(|| snapshot.used_in_window())),
            remaining: format_cell(snapshot.remaining),
            reset: format_reset(snapshot.reset),
        }
    }
}

fn format_reset(value: Option<i64>) -> String {
    value
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub async fn execute(ctx: &Context, all: bool) -> Result<()> {
    let client = ctx.client();
    let snapshot = match client.fetch_snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            if let Some(hint) = fetch_hint(&e) {
                print_warning(hint);
            }
            return Err(e).context("Failed to fetch rate limits");
        }
    };

    let rows: Vec<SnapshotRow> = if all {
        snapshot
            .resources
            .iter()
            .map(|(name, bucket)| SnapshotRow::new(name, bucket))
            .collect()
    } else {
        ctx.config
            .buckets
            .iter()
            .filter_map(|bucket| match snapshot.bucket(*bucket) {
                Some(data) => Some(SnapshotRow::new(bucket.as_str(), data)),
                None => {
                    print_warning(&format!("Bucket \"{}\" not present in response", bucket));
                    None
                }
            })
            .collect()
    };

    print_output(&rows, ctx.format)
}
