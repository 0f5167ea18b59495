//! Job phases
//!
//! A tracked job runs up to three phases, each in its own process:
//!
//! ```text
//! pre         fetch ──▶ save starting_rate_limits, start_time
//! checkpoint  fetch ──▶ save checkpoint_rate_limits, checkpoint_time   (optional)
//! post        load state, fetch ──▶ compute usage ──▶ outputs + summary
//! ```
//!
//! Every collaborator is passed in through [`PhaseContext`], so tests can
//! swap in scripted sources, in-memory stores and fixed clocks.

pub mod checkpoint;
pub mod post;
pub mod pre;

pub use checkpoint::run_checkpoint;
pub use post::{run_post, PostReport, UsageOutput};
pub use pre::run_pre;

use crate::error::Result;
use crate::services::clock::Clock;
use crate::services::output::OutputSink;
use crate::services::rate_limit::RateLimitSource;
use crate::services::state::{StateKey, StateStore};
use crate::services::usage::Resources;

/// Collaborators shared by every phase
#[derive(Clone, Copy)]
pub struct PhaseContext<'a> {
    pub source: &'a dyn RateLimitSource,
    pub store: &'a dyn StateStore,
    pub clock: &'a dyn Clock,
    pub sink: &'a dyn OutputSink,
}

/// How a phase finished
#[derive(Debug, Clone, PartialEq)]
pub enum PhaseOutcome {
    /// The phase had nothing to do
    Skipped { reason: String },
    /// A snapshot was captured and saved
    Completed,
    /// Usage was computed and published
    Reported(Box<PostReport>),
}

impl PhaseOutcome {
    pub(crate) fn skipped(reason: impl Into<String>) -> Self {
        PhaseOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, PhaseOutcome::Skipped { .. })
    }

    /// The post report, if this outcome carries one
    pub fn report(&self) -> Option<&PostReport> {
        match self {
            PhaseOutcome::Reported(report) => Some(&**report),
            _ => None,
        }
    }
}

/// Whether an earlier phase asked later phases to stand down
pub(crate) async fn skip_requested(store: &dyn StateStore) -> Result<bool> {
    Ok(store
        .load(StateKey::SkipPost)
        .await?
        .is_some_and(|value| value.trim() == "true"))
}

/// Log a captured snapshot at debug level
pub(crate) fn log_snapshot(phase: &str, label: &str, resources: &Resources) {
    if !log::log_enabled!(log::Level::Debug) {
        return;
    }
    match serde_json::to_string_pretty(resources) {
        Ok(json) => log::debug!("[apitrack:{}] {} snapshot:\n{}", phase, label, json),
        Err(e) => log::debug!("[apitrack:{}] {} snapshot not printable: {}", phase, label, e),
    }
}
