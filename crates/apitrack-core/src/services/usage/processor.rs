//! Bucket set processor
//!
//! Runs the calculator over every tracked bucket and folds the per-bucket
//! outcomes into an [`AggregateReport`]. One bucket's bad data never stops the
//! others from being processed.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde::Deserialize;

use super::calculator::compute_usage;
use super::types::{Bucket, BucketSnapshot, Resources, UsageFailure, UsageWarning};

// ============================================================================
// Report Types
// ============================================================================

/// Calls consumed, as seen from each observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct UsedCounts {
    /// `limit - remaining` in the starting snapshot
    pub start: Option<i64>,
    /// `limit - remaining` in the ending snapshot
    pub end: Option<i64>,
    /// Computed usage between the snapshots (a minimum when a reset was crossed)
    pub total: i64,
}

/// Remaining calls at each observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct RemainingCounts {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

/// Display-oriented view of one successfully computed bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct BucketReportEntry {
    pub used: UsedCounts,
    pub remaining: RemainingCounts,
    pub crossed_reset: bool,
}

impl BucketReportEntry {
    /// Combine the raw snapshots with the computed usage total
    pub fn build(
        starting: &BucketSnapshot,
        ending: &BucketSnapshot,
        total: i64,
        crossed_reset: bool,
    ) -> Self {
        Self {
            used: UsedCounts {
                start: starting.used_in_window(),
                end: ending.used_in_window(),
                total,
            },
            remaining: RemainingCounts {
                start: starting.remaining,
                end: ending.remaining,
            },
            crossed_reset,
        }
    }
}

/// Per-bucket entries in the order the buckets were requested
///
/// Serializes as a JSON object keyed by bucket name, keeping that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketData(Vec<(Bucket, BucketReportEntry)>);

impl BucketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bucket: Bucket, entry: BucketReportEntry) {
        if let Some(slot) = self.0.iter_mut().find(|(b, _)| *b == bucket) {
            slot.1 = entry;
        } else {
            self.0.push((bucket, entry));
        }
    }

    pub fn get(&self, bucket: Bucket) -> Option<&BucketReportEntry> {
        self.0.iter().find(|(b, _)| *b == bucket).map(|(_, e)| e)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Bucket, &BucketReportEntry)> {
        self.0.iter().map(|(b, e)| (*b, e))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for BucketData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (bucket, entry) in &self.0 {
            map.serialize_entry(bucket.as_str(), entry)?;
        }
        map.end()
    }
}

/// Everything the post phase learned about the tracked buckets
///
/// `total_used` is exact only when `crossed_buckets` is empty; otherwise it
/// is a lower bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateReport {
    pub data: BucketData,
    pub crossed_buckets: Vec<Bucket>,
    pub total_used: i64,
    pub warnings: Vec<String>,
}

impl AggregateReport {
    /// Fold per-bucket outcomes into a report
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = BucketOutcome>) -> Self {
        outcomes
            .into_iter()
            .fold(AggregateReport::default(), |mut report, outcome| {
                match outcome {
                    BucketOutcome::Counted {
                        bucket,
                        entry,
                        notes,
                    } => {
                        report.warnings.extend(notes);
                        report.total_used = report.total_used.saturating_add(entry.used.total);
                        if entry.crossed_reset {
                            report.crossed_buckets.push(bucket);
                        }
                        report.data.insert(bucket, entry);
                    }
                    BucketOutcome::Skipped { warning, .. } => report.warnings.push(warning),
                }
                report
            })
    }

    /// Whether any bucket crossed its reset boundary
    pub fn crossed_reset(&self) -> bool {
        !self.crossed_buckets.is_empty()
    }
}

// ============================================================================
// Processing
// ============================================================================

/// What happened to one requested bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketOutcome {
    /// Usage was computed and contributes to the total
    Counted {
        bucket: Bucket,
        entry: BucketReportEntry,
        /// Advisory messages that did not invalidate the bucket
        notes: Vec<String>,
    },
    /// The bucket was excluded from the aggregate
    Skipped { bucket: Bucket, warning: String },
}

impl BucketOutcome {
    pub fn bucket(&self) -> Bucket {
        match self {
            BucketOutcome::Counted { bucket, .. } | BucketOutcome::Skipped { bucket, .. } => {
                *bucket
            }
        }
    }
}

/// Inputs for one post-phase run
#[derive(Debug, Clone, Copy)]
pub struct ProcessRequest<'a> {
    pub buckets: &'a [Bucket],
    pub starting: &'a Resources,
    pub ending: &'a Resources,
    pub checkpoint: Option<&'a Resources>,
    /// Ending snapshot time, epoch seconds
    pub end_time_seconds: i64,
    /// Checkpoint snapshot time, epoch seconds
    pub checkpoint_time_seconds: Option<i64>,
}

/// Evaluate a single bucket
pub fn evaluate_bucket(request: &ProcessRequest<'_>, bucket: Bucket) -> BucketOutcome {
    let name = bucket.as_str();

    let Some(starting) = request.starting.get(name) else {
        return BucketOutcome::Skipped {
            bucket,
            warning: format!("Starting rate limit bucket \"{}\" not found; skipping", name),
        };
    };
    let Some(ending) = request.ending.get(name) else {
        return BucketOutcome::Skipped {
            bucket,
            warning: format!("Ending rate limit bucket \"{}\" not found; skipping", name),
        };
    };

    let checkpoint = request.checkpoint.and_then(|resources| resources.get(name));
    let usage = compute_usage(
        Some(starting),
        Some(ending),
        request.end_time_seconds,
        checkpoint,
        request.checkpoint_time_seconds,
    );

    if !usage.valid {
        let reason = usage.reason.unwrap_or(UsageFailure::NegativeUsage);
        return BucketOutcome::Skipped {
            bucket,
            warning: reason.warning_message(name),
        };
    }

    let mut notes = Vec::new();
    if usage.has_warning(UsageWarning::LimitChangedAcrossReset) {
        notes.push(format!(
            "Limit changed across reset for bucket \"{}\"; results may reflect a token change",
            name
        ));
    }

    BucketOutcome::Counted {
        bucket,
        entry: BucketReportEntry::build(starting, ending, usage.used, usage.crossed_reset),
        notes,
    }
}

/// Evaluate every requested bucket, in request order
pub fn evaluate_buckets(request: &ProcessRequest<'_>) -> Vec<BucketOutcome> {
    request
        .buckets
        .iter()
        .map(|bucket| evaluate_bucket(request, *bucket))
        .collect()
}

/// Compute usage for every requested bucket and aggregate the results
pub fn process_buckets(request: &ProcessRequest<'_>) -> AggregateReport {
    let outcomes = evaluate_buckets(request);
    for outcome in &outcomes {
        match outcome {
            BucketOutcome::Counted { bucket, entry, .. } => log::debug!(
                "[apitrack:usage] {}: used {} (crossed_reset={})",
                bucket,
                entry.used.total,
                entry.crossed_reset
            ),
            BucketOutcome::Skipped { bucket, .. } => {
                log::debug!("[apitrack:usage] {}: skipped", bucket)
            }
        }
    }
    AggregateReport::from_outcomes(outcomes)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn resources(entries: &[(&str, BucketSnapshot)]) -> Resources {
        entries
            .iter()
            .map(|(name, snapshot)| (name.to_string(), *snapshot))
            .collect()
    }

    fn request<'a>(
        buckets: &'a [Bucket],
        starting: &'a Resources,
        ending: &'a Resources,
    ) -> ProcessRequest<'a> {
        ProcessRequest {
            buckets,
            starting,
            ending,
            checkpoint: None,
            end_time_seconds: 1200,
            checkpoint_time_seconds: None,
        }
    }

    #[test]
    fn test_build_entry_from_snapshots() {
        let entry = BucketReportEntry::build(
            &BucketSnapshot::without_reset(1000, 900),
            &BucketSnapshot::without_reset(1000, 850),
            50,
            false,
        );
        assert_eq!(
            entry,
            BucketReportEntry {
                used: UsedCounts {
                    start: Some(100),
                    end: Some(150),
                    total: 50
                },
                remaining: RemainingCounts {
                    start: Some(900),
                    end: Some(850)
                },
                crossed_reset: false,
            }
        );
    }

    #[test]
    fn test_build_entry_with_missing_counts() {
        let starting = BucketSnapshot {
            limit: None,
            remaining: Some(900),
            reset: None,
            used: None,
        };
        let ending = BucketSnapshot {
            limit: Some(1000),
            remaining: None,
            reset: None,
            used: None,
        };
        let entry = BucketReportEntry::build(&starting, &ending, 50, true);
        let json = serde_json::to_value(entry).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "used": { "start": null, "end": null, "total": 50 },
                "remaining": { "start": 900, "end": null },
                "crossed_reset": true
            })
        );
    }

    #[test]
    fn test_process_sums_valid_buckets() {
        let starting = resources(&[
            ("core", BucketSnapshot::new(5000, 4900, 1600)),
            ("graphql", BucketSnapshot::new(5000, 5000, 1600)),
        ]);
        let ending = resources(&[
            ("core", BucketSnapshot::new(5000, 4850, 1600)),
            ("graphql", BucketSnapshot::new(5000, 4990, 1600)),
        ]);
        let buckets = [Bucket::Core, Bucket::Graphql];

        let report = process_buckets(&request(&buckets, &starting, &ending));

        assert_eq!(report.total_used, 60);
        assert!(report.crossed_buckets.is_empty());
        assert!(!report.crossed_reset());
        assert!(report.warnings.is_empty());
        assert_eq!(report.data.get(Bucket::Core).unwrap().used.total, 50);
        assert_eq!(report.data.get(Bucket::Graphql).unwrap().used.total, 10);
    }

    #[test]
    fn test_missing_buckets_warn_and_skip() {
        let starting = resources(&[
            ("search", BucketSnapshot::new(30, 30, 1600)),
            ("core", BucketSnapshot::new(5000, 4900, 1600)),
        ]);
        let ending = resources(&[
            ("graphql", BucketSnapshot::new(5000, 4990, 1600)),
            ("core", BucketSnapshot::new(5000, 4890, 1600)),
        ]);
        let buckets = [Bucket::Graphql, Bucket::Search, Bucket::Core];

        let report = process_buckets(&request(&buckets, &starting, &ending));

        assert_eq!(
            report.warnings,
            vec![
                "Starting rate limit bucket \"graphql\" not found; skipping".to_string(),
                "Ending rate limit bucket \"search\" not found; skipping".to_string(),
            ]
        );
        assert_eq!(report.data.len(), 1);
        assert_eq!(report.total_used, 10);
    }

    #[test]
    fn test_invalid_usage_is_translated_to_warning() {
        let starting = resources(&[
            ("core", BucketSnapshot::new(1000, 800, 1600)),
            ("search", BucketSnapshot::new(30, 25, 1600)),
        ]);
        let ending = resources(&[
            ("core", BucketSnapshot::new(1000, 900, 1600)),
            ("search", BucketSnapshot::new(30, 20, 1600)),
        ]);
        let buckets = [Bucket::Core, Bucket::Search];

        let report = process_buckets(&request(&buckets, &starting, &ending));

        assert_eq!(
            report.warnings,
            vec!["Remaining increased without reset for bucket \"core\"; skipping".to_string()]
        );
        assert!(report.data.get(Bucket::Core).is_none());
        assert_eq!(report.total_used, 5);
    }

    #[test]
    fn test_extreme_counters_do_not_overflow_window_usage() {
        let snapshot = BucketSnapshot {
            limit: Some(i64::MAX),
            remaining: Some(-5),
            reset: Some(1600),
            used: None,
        };
        let starting = resources(&[("core", snapshot)]);
        let ending = resources(&[("core", snapshot)]);
        let buckets = [Bucket::Core];

        let report = process_buckets(&request(&buckets, &starting, &ending));

        let entry = report.data.get(Bucket::Core).unwrap();
        assert_eq!(entry.used.start, None);
        assert_eq!(entry.used.end, None);
        assert_eq!(entry.used.total, 0);
        assert_eq!(entry.remaining.start, Some(-5));
        assert_eq!(report.total_used, 0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_crossed_buckets_recorded_with_checkpoint() {
        let starting = resources(&[
            ("core", BucketSnapshot::new(1000, 700, 1100)),
            ("search", BucketSnapshot::new(30, 30, 5000)),
        ]);
        let ending = resources(&[
            ("core", BucketSnapshot::new(1000, 900, 4700)),
            ("search", BucketSnapshot::new(30, 28, 5000)),
        ]);
        let checkpoint = resources(&[("core", BucketSnapshot::new(1000, 650, 1100))]);
        let buckets = [Bucket::Core, Bucket::Search];
        let request = ProcessRequest {
            buckets: &buckets,
            starting: &starting,
            ending: &ending,
            checkpoint: Some(&checkpoint),
            end_time_seconds: 1300,
            checkpoint_time_seconds: Some(1000),
        };

        let report = process_buckets(&request);

        assert_eq!(report.crossed_buckets, vec![Bucket::Core]);
        assert_eq!(report.total_used, 152);
        assert!(report.data.get(Bucket::Core).unwrap().crossed_reset);
    }

    #[test]
    fn test_limit_change_across_reset_adds_note_but_counts() {
        let starting = resources(&[("core", BucketSnapshot::new(1000, 600, 1100))]);
        let ending = resources(&[("core", BucketSnapshot::new(5000, 4700, 4700))]);
        let buckets = [Bucket::Core];
        let mut req = request(&buckets, &starting, &ending);
        req.end_time_seconds = 1300;

        let report = process_buckets(&req);

        assert_eq!(report.total_used, 300);
        assert_eq!(
            report.warnings,
            vec![
                "Limit changed across reset for bucket \"core\"; results may reflect a token change"
                    .to_string()
            ]
        );
    }

    #[test]
    fn test_outcomes_follow_request_order() {
        let starting = resources(&[
            ("core", BucketSnapshot::new(10, 10, 1600)),
            ("search", BucketSnapshot::new(10, 10, 1600)),
        ]);
        let ending = starting.clone();
        let buckets = [Bucket::Search, Bucket::Core];

        let outcomes = evaluate_buckets(&request(&buckets, &starting, &ending));
        let order: Vec<Bucket> = outcomes.iter().map(BucketOutcome::bucket).collect();
        assert_eq!(order, vec![Bucket::Search, Bucket::Core]);
    }

    #[test]
    fn test_bucket_data_serializes_in_insert_order() {
        let entry = BucketReportEntry::build(
            &BucketSnapshot::without_reset(10, 8),
            &BucketSnapshot::without_reset(10, 5),
            3,
            false,
        );
        let mut data = BucketData::new();
        data.insert(Bucket::Search, entry);
        data.insert(Bucket::Core, entry);

        let json = serde_json::to_string(&data).unwrap();
        let search_at = json.find("\"search\"").unwrap();
        let core_at = json.find("\"core\"").unwrap();
        assert!(search_at < core_at);
    }

    #[test]
    fn test_empty_bucket_list_yields_empty_report() {
        let starting = Resources::new();
        let report = process_buckets(&request(&[], &starting, &starting));
        assert_eq!(report, AggregateReport::default());
    }
}
