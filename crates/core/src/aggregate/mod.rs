//! Replay of a run's event log into an [`Aggregate`].
//!
//! The aggregator never keeps state between calls. Every aggregation folds
//! the whole replayed window from scratch, so two producers racing to
//! append can at worst make one aggregation slightly stale; the next event
//! recomputes from the complete log.

pub mod step_state;

use crate::config::models::StepWeights;
use ingest_protocol::event_models::Fields;
use ingest_protocol::run_models::Aggregate;
use ingest_protocol::step_models::{ProgressStatus, Step};
use std::collections::BTreeMap;

pub use step_state::{Observation, StepState, StepStates};

/// Weighted multi-step aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregator {
    weights: StepWeights,
}

impl Aggregator {
    pub fn new(weights: StepWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &StepWeights {
        &self.weights
    }

    /// Aggregates raw log entries given oldest first.
    ///
    /// Entries whose step is missing or unrecognized are left out of the
    /// fold; nothing in the log can make aggregation fail.
    pub fn aggregate<'a, I>(&self, entries: I) -> Aggregate
    where
        I: IntoIterator<Item = &'a Fields>,
    {
        let observations: Vec<Observation> = entries
            .into_iter()
            .filter_map(Observation::from_fields)
            .collect();
        self.aggregate_observations(&observations)
    }

    /// Aggregates decoded observations given oldest first.
    pub fn aggregate_observations(&self, observations: &[Observation]) -> Aggregate {
        self.aggregate_states(&StepStates::fold(observations))
    }

    pub fn aggregate_states(&self, states: &StepStates) -> Aggregate {
        let per_step_pct: BTreeMap<Step, f64> =
            states.iter().map(|(step, state)| (step, state.pct())).collect();

        let weighted: f64 = per_step_pct
            .iter()
            .map(|(step, pct)| self.weights.weight(*step) * pct / 100.0)
            .sum();
        let mut overall_pct = (weighted * 100.0).clamp(0.0, 100.0);

        let mut current_step = most_recent(states, ProgressStatus::Running)
            .or_else(|| most_recent(states, ProgressStatus::Completed));

        let any_failed = states
            .iter()
            .any(|(_, state)| state.status == Some(ProgressStatus::Failed));
        let status = if any_failed {
            ProgressStatus::Failed
        } else if per_step_pct.values().all(|pct| *pct >= 100.0) {
            overall_pct = 100.0;
            current_step = Some(Step::LAST);
            ProgressStatus::Completed
        } else if per_step_pct.values().any(|pct| *pct > 0.0) {
            ProgressStatus::Running
        } else {
            ProgressStatus::Pending
        };

        let current_step_pct = current_step
            .and_then(|step| per_step_pct.get(&step).copied())
            .unwrap_or(0.0);

        Aggregate {
            per_step_pct,
            overall_pct,
            current_step,
            current_step_pct,
            status,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new(StepWeights::default())
    }
}

/// The step whose latest status is `status` and was reported most recently.
fn most_recent(states: &StepStates, status: ProgressStatus) -> Option<Step> {
    states
        .iter()
        .filter(|(_, state)| state.status == Some(status))
        .max_by_key(|(_, state)| state.recency())
        .map(|(step, _)| step)
}
