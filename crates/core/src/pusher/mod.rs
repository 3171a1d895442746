//! Producer-side progress pushers.
//!
//! A pipeline stage reports progress through a [`ProgressPusher`]. Reporting
//! is best effort: calls never block and never fail. Throttling is decided
//! on the caller's side; accepted events travel over a bounded queue to a
//! detached worker that delivers them to a [`ProgressSink`] and logs any
//! failure.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use ingest_core::config::models::PusherConfig;
//! # use ingest_core::pusher::{HttpSink, ProgressPusher};
//! # use ingest_protocol::step_models::Step;
//! # async fn demo() -> Result<(), ingest_core::pusher::PushError> {
//! let config = PusherConfig::default();
//! let sink = Arc::new(HttpSink::new(&config)?);
//! let (mut pusher, worker) =
//!     ProgressPusher::spawn(&config, sink, Some("user-1"), Some("file-1"), Step::Embedding);
//!
//! pusher.start(Some(100));
//! for done in 1..=100 {
//!     pusher.advance(done, None);
//! }
//! pusher.complete(None, None);
//!
//! drop(pusher);
//! worker.join().await;
//! # Ok(())
//! # }
//! ```

pub mod sink;
pub mod throttle;

use crate::config::models::PusherConfig;
use chrono::Utc;
use ingest_protocol::event_models::ProgressEventRequest;
use ingest_protocol::step_models::{ProgressStatus, Step};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

pub use sink::{HttpSink, LocalSink, ProgressSink, PushError, USER_HEADER};
pub use throttle::{progress_pct, Throttle};

/// One event waiting for delivery.
#[derive(Debug, Clone)]
struct PushJob {
    request: ProgressEventRequest,
    user_id: Option<String>,
}

/// Delivery counts of a finished worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushStats {
    pub sent: usize,
    pub failed: usize,
}

/// Handle to the delivery task of a pusher family.
#[derive(Debug)]
pub struct PushWorker {
    handle: JoinHandle<PushStats>,
}

impl PushWorker {
    /// Waits until every pusher sharing the queue is dropped and the queue
    /// is drained.
    pub async fn join(self) -> PushStats {
        match self.handle.await {
            Ok(stats) => stats,
            Err(err) => {
                warn!(error = %err, "Progress push worker ended abnormally");
                PushStats::default()
            }
        }
    }
}

async fn deliver(mut rx: mpsc::Receiver<PushJob>, sink: Arc<dyn ProgressSink>) -> PushStats {
    let mut stats = PushStats::default();
    while let Some(job) = rx.recv().await {
        match sink.send(&job.request, job.user_id.as_deref()).await {
            Ok(()) => {
                stats.sent += 1;
                debug!(
                    step = job.request.current_step.as_deref().unwrap_or_default(),
                    status = job.request.status.as_deref().unwrap_or_default(),
                    "Progress pushed"
                );
            }
            Err(err) => {
                stats.failed += 1;
                warn!(
                    step = job.request.current_step.as_deref().unwrap_or_default(),
                    error = %err,
                    "Progress push failed (ignored)"
                );
            }
        }
    }
    stats
}

/// Throttled progress reporter for one step of one file.
#[derive(Debug)]
pub struct ProgressPusher {
    tx: mpsc::Sender<PushJob>,
    user_id: Option<String>,
    file_no: Option<String>,
    run_id: Option<String>,
    step: Step,
    throttle: Throttle,
    last_processed: Option<u64>,
    last_total: Option<u64>,
    origin: Instant,
}

impl ProgressPusher {
    /// Starts a delivery worker and returns the first pusher feeding it.
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(
        config: &PusherConfig,
        sink: Arc<dyn ProgressSink>,
        user_id: Option<&str>,
        file_no: Option<&str>,
        step: Step,
    ) -> (ProgressPusher, PushWorker) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let handle = tokio::spawn(deliver(rx, sink));
        let pusher = ProgressPusher {
            tx,
            user_id: user_id.filter(|u| !u.is_empty()).map(str::to_string),
            file_no: file_no.filter(|f| !f.is_empty()).map(str::to_string),
            run_id: None,
            step,
            throttle: Throttle::new(config.min_pct_step, config.min_interval_ms),
            last_processed: None,
            last_total: None,
            origin: Instant::now(),
        };
        (pusher, PushWorker { handle })
    }

    /// A pusher for another step of the same file, sharing this pusher's
    /// queue, run id and throttle settings.
    pub fn with_step(&self, step: Step) -> ProgressPusher {
        let mut throttle = self.throttle.clone();
        throttle.reset();
        ProgressPusher {
            tx: self.tx.clone(),
            user_id: self.user_id.clone(),
            file_no: self.file_no.clone(),
            run_id: self.run_id.clone(),
            step,
            throttle,
            last_processed: None,
            last_total: None,
            origin: self.origin,
        }
    }

    /// Pins the run id. Without one the server resolves the run from
    /// `fileNo`.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        self.run_id = (!run_id.trim().is_empty()).then_some(run_id);
        self
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// Reports the step as started. Subject to throttling.
    pub fn start(&mut self, total: Option<u64>) -> bool {
        self.report(ProgressStatus::Running, Some(0), total, false)
    }

    /// Reports a running update. Subject to throttling.
    ///
    /// A missing total falls back to the last reported one.
    pub fn advance(&mut self, processed: u64, total: Option<u64>) -> bool {
        let total = total.or(self.last_total);
        self.report(ProgressStatus::Running, Some(processed), total, false)
    }

    /// Reports the step as completed. Never throttled.
    ///
    /// A missing total falls back to the last reported one. A missing
    /// `processed` counts the step as fully processed when a total is known,
    /// and falls back to the last reported value otherwise.
    pub fn complete(&mut self, processed: Option<u64>, total: Option<u64>) -> bool {
        let total = total.or(self.last_total);
        let processed = processed.or(total).or(self.last_processed);
        self.report(ProgressStatus::Completed, processed, total, true)
    }

    /// Reports the step as failed. Never throttled.
    pub fn fail(&mut self, processed: Option<u64>, total: Option<u64>) -> bool {
        let processed = processed.or(self.last_processed);
        let total = total.or(self.last_total);
        self.report(ProgressStatus::Failed, processed, total, true)
    }

    /// Returns `true` if the event was queued for delivery.
    fn report(
        &mut self,
        status: ProgressStatus,
        processed: Option<u64>,
        total: Option<u64>,
        force: bool,
    ) -> bool {
        self.last_processed = processed.or(self.last_processed);
        self.last_total = total.or(self.last_total);

        let now_ms = i64::try_from(self.origin.elapsed().as_millis()).unwrap_or(i64::MAX);
        let pct = progress_pct(processed, total);
        if !force && !self.throttle.should_send(pct, now_ms) {
            debug!(
                step = %self.step,
                ?processed,
                ?total,
                ?pct,
                "Progress push skipped (throttled)"
            );
            return false;
        }

        let job = PushJob {
            request: ProgressEventRequest {
                run_id: self.run_id.clone(),
                user_id: self.user_id.clone(),
                file_no: self.file_no.clone(),
                current_step: Some(self.step.as_str().to_string()),
                status: Some(status.as_str().to_string()),
                processed,
                total,
                event_type: None,
                ts: Some(Utc::now().timestamp_millis()),
            },
            user_id: self.user_id.clone(),
        };

        let queued = match self.tx.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(job)) if force => self.enqueue_detached(job),
            Err(TrySendError::Full(_)) => {
                warn!(step = %self.step, %status, "Progress queue full, event dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(step = %self.step, %status, "Progress worker stopped, event dropped");
                false
            }
        };
        if queued {
            self.throttle.record(pct, now_ms);
        }
        queued
    }

    /// Waits for queue space on a detached task so a terminal report
    /// survives a full queue without blocking the caller. The task holds a
    /// sender, so [`PushWorker::join`] still waits for it.
    fn enqueue_detached(&self, job: PushJob) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(step = %self.step, "No runtime for a full progress queue, event dropped");
            return false;
        };
        debug!(step = %self.step, "Progress queue full, terminal event deferred");
        let tx = self.tx.clone();
        runtime.spawn(async move {
            if tx.send(job).await.is_err() {
                warn!("Progress worker stopped, terminal event dropped");
            }
        });
        true
    }
}
