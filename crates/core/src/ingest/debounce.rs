//! Debounce policy for run snapshot writes.
//!
//! Noisy producers report many sub-percent advances. The snapshot is only
//! rewritten when the published percentage moved far enough from what is
//! stored, or when the current step or run status changed.

use ingest_protocol::run_models::{Aggregate, RunSnapshot};
use ingest_protocol::step_models::{ProgressStatus, Step};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebouncePolicy {
    delta_pct: f64,
}

impl DebouncePolicy {
    pub fn new(delta_pct: f64) -> Self {
        Self {
            delta_pct: delta_pct.max(0.0),
        }
    }

    pub fn delta_pct(&self) -> f64 {
        self.delta_pct
    }

    /// Overall percentage to publish for `agg`.
    ///
    /// Never lower than the stored value, and exactly 100 once the run is
    /// complete.
    pub fn published_overall(&self, prev: Option<&RunSnapshot>, agg: &Aggregate) -> f64 {
        if agg.status == ProgressStatus::Completed {
            return 100.0;
        }
        let prev_overall = prev.map_or(0.0, |snapshot| snapshot.overall_pct);
        agg.overall_pct.max(prev_overall)
    }

    /// Whether a snapshot with these values should replace `prev`.
    ///
    /// The percentage delta is measured against the stored snapshot, so
    /// suppressed advances accumulate until they cross the threshold.
    pub fn should_write(
        &self,
        prev: Option<&RunSnapshot>,
        status: ProgressStatus,
        current_step: Step,
        overall_pct: f64,
    ) -> bool {
        let Some(prev) = prev else {
            return true;
        };
        (overall_pct - prev.overall_pct).abs() >= self.delta_pct
            || prev.current_step != Some(current_step)
            || prev.status != status
    }
}

impl Default for DebouncePolicy {
    fn default() -> Self {
        Self::new(1.0)
    }
}
