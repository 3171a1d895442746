//! Send/skip decisions for progress updates of one step.

/// Completion percentage from local counters, `None` when `total` is
/// unknown or zero.
pub fn progress_pct(processed: Option<u64>, total: Option<u64>) -> Option<f64> {
    match (processed, total) {
        (Some(processed), Some(total)) if total > 0 => {
            Some((100.0 * processed as f64 / total as f64).clamp(0.0, 100.0))
        }
        _ => None,
    }
}

/// Throttle for `RUNNING` updates.
///
/// An update is sent when its percentage moved at least `min_pct_step`
/// from the last sent one, or when `min_interval_ms` elapsed since the last
/// send. Updates without a percentage only pass the time gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Throttle {
    min_pct_step: f64,
    min_interval_ms: i64,
    last_sent_pct: Option<f64>,
    last_sent_ms: Option<i64>,
}

impl Throttle {
    pub fn new(min_pct_step: f64, min_interval_ms: i64) -> Self {
        Self {
            min_pct_step,
            min_interval_ms,
            last_sent_pct: None,
            last_sent_ms: None,
        }
    }

    pub fn should_send(&self, pct: Option<f64>, now_ms: i64) -> bool {
        let interval_elapsed = self
            .last_sent_ms
            .map_or(true, |last| now_ms - last >= self.min_interval_ms);

        let Some(pct) = pct else {
            return interval_elapsed;
        };
        match self.last_sent_pct {
            None => true,
            Some(last) if (pct - last).abs() >= self.min_pct_step => true,
            Some(_) => interval_elapsed,
        }
    }

    /// Marks an update as sent.
    pub fn record(&mut self, pct: Option<f64>, now_ms: i64) {
        self.last_sent_ms = Some(now_ms);
        if pct.is_some() {
            self.last_sent_pct = pct;
        }
    }

    /// Forgets what was sent, keeping the thresholds.
    pub fn reset(&mut self) {
        self.last_sent_pct = None;
        self.last_sent_ms = None;
    }

    pub fn last_sent_pct(&self) -> Option<f64> {
        self.last_sent_pct
    }
}
