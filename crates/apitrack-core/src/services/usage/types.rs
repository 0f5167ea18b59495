//! Rate limit usage types
//!
//! Types shared by the usage calculator, the bucket set processor and the
//! summary builder.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Bucket Identifiers
// ============================================================================

/// A GitHub rate limit resource bucket that can be tracked
///
/// This is the closed set of bucket names accepted on the command line.
/// Snapshots may contain other resource names; those are kept in the
/// snapshot but can never be selected for tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Core,
    Search,
    CodeSearch,
    Graphql,
    IntegrationManifest,
    DependencySnapshots,
    DependencySbom,
    CodeScanningUpload,
    ActionsRunnerRegistration,
    SourceImport,
}

impl Bucket {
    /// Every recognised bucket, in the order GitHub documents them
    pub const ALL: [Bucket; 10] = [
        Bucket::Core,
        Bucket::Search,
        Bucket::CodeSearch,
        Bucket::Graphql,
        Bucket::IntegrationManifest,
        Bucket::DependencySnapshots,
        Bucket::DependencySbom,
        Bucket::CodeScanningUpload,
        Bucket::ActionsRunnerRegistration,
        Bucket::SourceImport,
    ];

    /// Resource name as it appears in the `/rate_limit` response
    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Core => "core",
            Bucket::Search => "search",
            Bucket::CodeSearch => "code_search",
            Bucket::Graphql => "graphql",
            Bucket::IntegrationManifest => "integration_manifest",
            Bucket::DependencySnapshots => "dependency_snapshots",
            Bucket::DependencySbom => "dependency_sbom",
            Bucket::CodeScanningUpload => "code_scanning_upload",
            Bucket::ActionsRunnerRegistration => "actions_runner_registration",
            Bucket::SourceImport => "source_import",
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Bucket::ALL
            .iter()
            .copied()
            .find(|b| b.as_str() == normalized)
            .ok_or_else(|| format!("Unknown bucket: {}", s))
    }
}

// ============================================================================
// Snapshot Types
// ============================================================================

/// One bucket's counters at one instant
///
/// Every field is optional: a counter the provider omitted, or sent in a
/// form that is not an integral number, is `None`. The calculator decides
/// which missing counters are fatal for a given comparison.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketSnapshot {
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub remaining: Option<i64>,
    /// Epoch seconds at which `remaining` is restored to `limit`
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub reset: Option<i64>,
    #[serde(default, deserialize_with = "lenient_count", skip_serializing_if = "Option::is_none")]
    pub used: Option<i64>,
}

impl BucketSnapshot {
    /// Create a snapshot with limit, remaining and reset set
    pub fn new(limit: i64, remaining: i64, reset: i64) -> Self {
        Self {
            limit: Some(limit),
            remaining: Some(remaining),
            reset: Some(reset),
            used: limit.checked_sub(remaining),
        }
    }

    /// Create a snapshot with only limit and remaining set
    pub fn without_reset(limit: i64, remaining: i64) -> Self {
        Self {
            limit: Some(limit),
            remaining: Some(remaining),
            reset: None,
            used: limit.checked_sub(remaining),
        }
    }

    /// Calls consumed in the current window, derived as `limit - remaining`
    ///
    /// `None` when either counter is missing or the difference overflows.
    pub fn used_in_window(&self) -> Option<i64> {
        self.limit?.checked_sub(self.remaining?)
    }
}

/// Resource name to bucket counters, as captured by one fetch
pub type Resources = BTreeMap<String, BucketSnapshot>;

/// The decoded body of `GET /rate_limit`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    #[serde(default)]
    pub resources: Resources,
}

impl RateLimitSnapshot {
    /// Look up a tracked bucket in this snapshot
    pub fn bucket(&self, bucket: Bucket) -> Option<&BucketSnapshot> {
        self.resources.get(bucket.as_str())
    }
}

/// Accepts integers, integral floats and numeric strings; everything else is `None`
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(count_from_value))
}

fn count_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

// ============================================================================
// Usage Result Types
// ============================================================================

/// Why a bucket's usage could not be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageFailure {
    MissingBucket,
    InvalidRemaining,
    InvalidLimit,
    LimitChangedWithoutReset,
    RemainingIncreasedWithoutReset,
    NegativeUsage,
}

impl UsageFailure {
    /// Stable code for this failure
    pub fn code(&self) -> &'static str {
        match self {
            UsageFailure::MissingBucket => "missing_bucket",
            UsageFailure::InvalidRemaining => "invalid_remaining",
            UsageFailure::InvalidLimit => "invalid_limit",
            UsageFailure::LimitChangedWithoutReset => "limit_changed_without_reset",
            UsageFailure::RemainingIncreasedWithoutReset => "remaining_increased_without_reset",
            UsageFailure::NegativeUsage => "negative_usage",
        }
    }

    /// Human readable warning for a bucket that is being skipped
    pub fn warning_message(&self, bucket: &str) -> String {
        match self {
            UsageFailure::MissingBucket => {
                format!("Rate limit bucket \"{}\" not found; skipping", bucket)
            }
            UsageFailure::InvalidRemaining => {
                format!("Invalid remaining count for bucket \"{}\"; skipping", bucket)
            }
            UsageFailure::InvalidLimit => {
                format!("Invalid limit for bucket \"{}\" during reset crossing; skipping", bucket)
            }
            UsageFailure::LimitChangedWithoutReset => {
                format!("Limit changed without reset for bucket \"{}\"; skipping", bucket)
            }
            UsageFailure::RemainingIncreasedWithoutReset => {
                format!("Remaining increased without reset for bucket \"{}\"; skipping", bucket)
            }
            UsageFailure::NegativeUsage => {
                format!("Negative usage for bucket \"{}\" detected; skipping", bucket)
            }
        }
    }
}

impl std::fmt::Display for UsageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Advisory condition attached to an otherwise valid result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageWarning {
    LimitChangedAcrossReset,
}

impl std::fmt::Display for UsageWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageWarning::LimitChangedAcrossReset => write!(f, "limit_changed_across_reset"),
        }
    }
}

/// Outcome of comparing one bucket across snapshots
///
/// Built only through [`UsageResult::valid`] and [`UsageResult::invalid`], so an
/// invalid result always has `used == 0`, no `remaining` and a `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageResult {
    pub valid: bool,
    pub used: i64,
    pub remaining: Option<i64>,
    pub crossed_reset: bool,
    pub warnings: Vec<UsageWarning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<UsageFailure>,
}

impl UsageResult {
    /// A computed, non-negative usage figure
    pub fn valid(
        used: i64,
        remaining: i64,
        crossed_reset: bool,
        warnings: Vec<UsageWarning>,
    ) -> Self {
        Self {
            valid: true,
            used,
            remaining: Some(remaining),
            crossed_reset,
            warnings,
            reason: None,
        }
    }

    /// A rejected comparison
    ///
    /// Warnings gathered before the rejection are dropped; they describe a
    /// result that no longer exists.
    pub fn invalid(reason: UsageFailure, crossed_reset: bool) -> Self {
        Self {
            valid: false,
            used: 0,
            remaining: None,
            crossed_reset,
            warnings: Vec::new(),
            reason: Some(reason),
        }
    }

    /// Whether the given advisory warning was raised
    pub fn has_warning(&self, warning: UsageWarning) -> bool {
        self.warnings.contains(&warning)
    }
}

// ============================================================================
// Tests
// ============================================================================
