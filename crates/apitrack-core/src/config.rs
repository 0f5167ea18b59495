//! Tracker configuration
//!
//! Resolves the raw action inputs (token, bucket list, output path, quiet
//! flag, job id) into a [`TrackerConfig`] the phase functions consume.

use std::path::PathBuf;

use crate::services::usage::Bucket;

/// Environment variable holding an explicit job id
pub const JOB_ID_ENV: &str = "APITRACK_JOB_ID";

/// Job id used when nothing identifies the current CI job
pub const LOCAL_JOB_ID: &str = "local";

/// Bucket list used when none is configured
pub const DEFAULT_BUCKETS: &str = "core";

// ============================================================================
// Bucket Selection
// ============================================================================

/// Result of parsing a comma-separated bucket list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketSelection {
    /// Recognised buckets, first occurrence order, no duplicates
    pub valid: Vec<Bucket>,
    /// Entries that did not name a recognised bucket, lowercased
    pub invalid: Vec<String>,
}

impl BucketSelection {
    /// Warning text for the unrecognised entries, if there were any
    pub fn invalid_warning(&self) -> Option<String> {
        if self.invalid.is_empty() {
            return None;
        }
        let options: Vec<&str> = Bucket::ALL.iter().map(Bucket::as_str).collect();
        Some(format!(
            "Invalid bucket(s) selected: {}; valid options are: {}",
            self.invalid.join(", "),
            options.join(", ")
        ))
    }
}

/// Parse a comma-separated bucket list
///
/// Entries are trimmed and lowercased; empty entries are dropped silently.
pub fn parse_buckets(raw: &str) -> BucketSelection {
    let mut selection = BucketSelection::default();

    for entry in raw.to_lowercase().split(',').map(str::trim) {
        if entry.is_empty() {
            continue;
        }
        match entry.parse::<Bucket>() {
            Ok(bucket) if !selection.valid.contains(&bucket) => selection.valid.push(bucket),
            Ok(_) => {}
            Err(_) => {
                if !selection.invalid.iter().any(|name| name == entry) {
                    selection.invalid.push(entry.to_string());
                }
            }
        }
    }

    selection
}

/// Interpret a quiet flag input; only `true` (any case) enables it
pub fn is_quiet(raw: Option<&str>) -> bool {
    raw.map(|value| value.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

// ============================================================================
// Job Identity
// ============================================================================

/// Resolve the job id that scopes persisted phase state
///
/// Order: explicit value, `APITRACK_JOB_ID`, then
/// `GITHUB_RUN_ID-GITHUB_RUN_ATTEMPT-GITHUB_JOB`, then `local`.
pub fn resolve_job_id(explicit: Option<&str>) -> String {
    job_id_from(explicit, |key| std::env::var(key).ok())
}

fn job_id_from(explicit: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> String {
    let non_empty = |value: String| {
        let trimmed = value.trim().to_string();
        (!trimmed.is_empty()).then_some(trimmed)
    };

    if let Some(id) = explicit.map(str::to_string).and_then(non_empty) {
        return id;
    }
    if let Some(id) = lookup(JOB_ID_ENV).and_then(non_empty) {
        return id;
    }

    let run_id = lookup("GITHUB_RUN_ID").and_then(non_empty);
    let attempt = lookup("GITHUB_RUN_ATTEMPT")
        .and_then(non_empty)
        .unwrap_or_else(|| "1".to_string());
    let job = lookup("GITHUB_JOB")
        .and_then(non_empty)
        .unwrap_or_else(|| "job".to_string());

    match run_id {
        Some(run_id) => format!("{}-{}-{}", run_id, attempt, job),
        None => LOCAL_JOB_ID.to_string(),
    }
}

// ============================================================================
// TrackerConfig
// ============================================================================

/// Resolved inputs for one phase invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerConfig {
    /// API token; `None` when absent or blank
    pub token: Option<String>,
    /// Buckets to track, in request order
    pub buckets: Vec<Bucket>,
    /// Where to write the JSON usage document, if anywhere
    pub output_path: Option<PathBuf>,
    pub quiet: bool,
}

impl TrackerConfig {
    /// Build a config from raw input strings
    ///
    /// Returns the config together with the bucket selection so callers can
    /// report unrecognised names.
    pub fn from_inputs(
        token: Option<&str>,
        buckets: &str,
        output_path: Option<&str>,
        quiet: bool,
    ) -> (Self, BucketSelection) {
        let selection = parse_buckets(buckets);
        let config = Self {
            token: token
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            buckets: selection.valid.clone(),
            output_path: output_path
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            quiet,
        };
        (config, selection)
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

// ============================================================================
// Tests
// ============================================================================
