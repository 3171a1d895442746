//! Per-step state reconstructed from a run's event log.

use ingest_protocol::event_models::{field, non_empty, Fields};
use ingest_protocol::step_models::{ProgressStatus, Step};

/// The parts of one logged event the fold cares about.
///
/// Decoding is lenient: legacy field names are accepted, and counters,
/// statuses or timestamps that do not parse are treated as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub step: Step,
    pub status: Option<ProgressStatus>,
    pub processed: Option<u64>,
    pub total: Option<u64>,
    pub ts: Option<i64>,
}

impl Observation {
    /// Returns `None` for entries without a recognized step.
    pub fn from_fields(fields: &Fields) -> Option<Observation> {
        let raw_step = non_empty(fields, field::CURRENT_STEP)
            .or_else(|| non_empty(fields, field::LEGACY_STEP))?;
        let step = Step::parse(raw_step).known()?;
        let ts = non_empty(fields, field::TS)
            .or_else(|| non_empty(fields, field::LEGACY_TS))
            .and_then(|v| v.trim().parse().ok());

        Some(Observation {
            step,
            status: non_empty(fields, field::STATUS)
                .and_then(|v| ProgressStatus::parse(v).known()),
            processed: non_empty(fields, field::PROCESSED).and_then(|v| v.trim().parse().ok()),
            total: non_empty(fields, field::TOTAL).and_then(|v| v.trim().parse().ok()),
            ts,
        })
    }
}

/// Reconstructed state of one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepState {
    /// Largest `processed` seen for the step.
    pub processed: Option<u64>,

    /// Largest `total` seen for the step.
    pub total: Option<u64>,

    /// Status of the most recent event that carried one.
    pub status: Option<ProgressStatus>,

    /// Producer timestamp of the event `status` came from.
    pub status_ts: Option<i64>,

    /// Arrival position of the event `status` came from.
    pub status_seq: usize,
}

impl StepState {
    /// Folds one observation into the state. `seq` is the arrival position
    /// of the observation within the replayed log.
    pub fn observe(&mut self, obs: &Observation, seq: usize) {
        if let Some(processed) = obs.processed {
            self.processed = Some(self.processed.map_or(processed, |p| p.max(processed)));
        }
        if let Some(total) = obs.total {
            self.total = Some(self.total.map_or(total, |t| t.max(total)));
        }
        if let Some(status) = obs.status {
            // Later arrival wins ties on timestamp.
            let newer = self.status.is_none()
                || obs.ts.unwrap_or(0) >= self.status_ts.unwrap_or(0);
            if newer {
                self.status = Some(status);
                self.status_ts = obs.ts;
                self.status_seq = seq;
            }
        }
    }

    /// Completion of the step in `[0, 100]`.
    ///
    /// Counters win when a positive total is known; otherwise a completed
    /// step counts as 100 and anything else as 0.
    pub fn pct(&self) -> f64 {
        match (self.processed, self.total) {
            (Some(processed), Some(total)) if total > 0 => {
                (100.0 * processed as f64 / total as f64).clamp(0.0, 100.0)
            }
            _ if self.status == Some(ProgressStatus::Completed) => 100.0,
            _ => 0.0,
        }
    }

    /// Recency key of the status, used to pick the current step.
    pub fn recency(&self) -> (i64, usize) {
        (self.status_ts.unwrap_or(0), self.status_seq)
    }
}

/// State of all five steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStates([StepState; 5]);

impl StepStates {
    /// Folds observations given in arrival order.
    pub fn fold<'a, I>(observations: I) -> Self
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        let mut states = StepStates::default();
        for (seq, obs) in observations.into_iter().enumerate() {
            states.0[obs.step.index()].observe(obs, seq);
        }
        states
    }

    pub fn get(&self, step: Step) -> &StepState {
        &self.0[step.index()]
    }

    /// Steps with their states, in pipeline order.
    pub fn iter(&self) -> impl Iterator<Item = (Step, &StepState)> {
        Step::ALL.into_iter().zip(self.0.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(
        step: Step,
        status: Option<ProgressStatus>,
        processed: Option<u64>,
        total: Option<u64>,
        ts: i64,
    ) -> Observation {
        Observation {
            step,
            status,
            processed,
            total,
            ts: Some(ts),
        }
    }

    #[test]
    fn test_counters_take_running_maximum() {
        let states = StepStates::fold(&[
            obs(Step::Embedding, None, Some(8), Some(10), 1),
            obs(Step::Embedding, None, Some(3), Some(10), 2),
        ]);
        let state = states.get(Step::Embedding);
        assert_eq!(state.processed, Some(8));
        assert_eq!(state.total, Some(10));
        assert_eq!(state.pct(), 80.0);
    }

    #[test]
    fn test_status_follows_latest_timestamp() {
        let states = StepStates::fold(&[
            obs(Step::Chunking, Some(ProgressStatus::Completed), None, None, 20),
            obs(Step::Chunking, Some(ProgressStatus::Running), None, None, 10),
        ]);
        assert_eq!(
            states.get(Step::Chunking).status,
            Some(ProgressStatus::Completed)
        );
    }

    #[test]
    fn test_status_tie_goes_to_later_arrival() {
        let states = StepStates::fold(&[
            obs(Step::Chunking, Some(ProgressStatus::Running), None, None, 10),
            obs(Step::Chunking, Some(ProgressStatus::Failed), None, None, 10),
        ]);
        let state = states.get(Step::Chunking);
        assert_eq!(state.status, Some(ProgressStatus::Failed));
        assert_eq!(state.status_seq, 1);
    }

    #[test]
    fn test_pct_clamps_and_falls_back_to_status() {
        let over = StepState {
            processed: Some(15),
            total: Some(10),
            ..StepState::default()
        };
        assert_eq!(over.pct(), 100.0);

        let completed_without_total = StepState {
            processed: Some(0),
            total: Some(0),
            status: Some(ProgressStatus::Completed),
            ..StepState::default()
        };
        assert_eq!(completed_without_total.pct(), 100.0);

        let running_without_total = StepState {
            status: Some(ProgressStatus::Running),
            ..StepState::default()
        };
        assert_eq!(running_without_total.pct(), 0.0);
    }

    #[test]
    fn test_observation_accepts_legacy_keys() {
        let fields: Fields = [
            ("step", "vector-store"),
            ("status", "running"),
            ("processed", "2"),
            ("total", "x"),
            ("timestamp", "55"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let obs = Observation::from_fields(&fields).unwrap();
        assert_eq!(obs.step, Step::VectorStore);
        assert_eq!(obs.status, Some(ProgressStatus::Running));
        assert_eq!(obs.processed, Some(2));
        assert_eq!(obs.total, None);
        assert_eq!(obs.ts, Some(55));
    }

    #[test]
    fn test_observation_skips_unknown_step() {
        let fields: Fields = [("currentStep", "BOGUS"), ("status", "RUNNING")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert!(Observation::from_fields(&fields).is_none());
    }
}
