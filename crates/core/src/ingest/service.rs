//! The ingestion service.
//!
//! [`ProgressService`] owns the write path of the engine: every accepted
//! event is appended to its run's log and to the global log before any
//! aggregation runs, so a failure further down never loses the event.

use crate::aggregate::Aggregator;
use crate::config::models::ProgressConfig;
use crate::feed::ProgressFeed;
use crate::ingest::debounce::DebouncePolicy;
use crate::ingest::error::{IngestError, IngestResult};
use crate::ingest::normalize::{build_event, file_key_candidates, normalize_file_no};
use crate::ingest::terminal::{self, RunOutcome};
use crate::store::{keys, MonotonicGuard, ProgressStore, StoreResult};
use chrono::{DateTime, Utc};
use ingest_protocol::event_models::{
    field, EntryId, FeedEntry, Fields, ProgressEvent, ProgressEventRequest, StreamEntry,
};
use ingest_protocol::http_models::IngestAck;
use ingest_protocol::run_models::{Aggregate, RunSnapshot};
use ingest_protocol::step_models::{EventType, ProgressStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::{debug, error, info};

/// Published snapshots never lose percentage and never leave a terminal
/// status, whatever order concurrent settles land in.
const SNAPSHOT_GUARD: MonotonicGuard<'static> = MonotonicGuard {
    rank_field: field::OVERALL_PCT,
    state_field: field::STATUS,
    final_states: &[
        ProgressStatus::Completed.as_str(),
        ProgressStatus::Failed.as_str(),
    ],
};

/// Result of settling one event against the stored snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub aggregate: Aggregate,

    /// Overall percentage after the monotonic guard.
    pub overall_pct: f64,

    /// Whether the snapshot was rewritten.
    pub written: bool,

    /// Whether a terminal entry was emitted.
    pub terminal: bool,
}

/// Ingestion, aggregation and read access for progress runs.
///
/// Cheap to clone; clones share the store, configuration and feed.
#[derive(Clone)]
pub struct ProgressService {
    store: Arc<dyn ProgressStore>,
    config: Arc<ProgressConfig>,
    aggregator: Aggregator,
    debounce: DebouncePolicy,
    feed: ProgressFeed,
}

impl ProgressService {
    pub fn new(store: Arc<dyn ProgressStore>, config: ProgressConfig) -> Self {
        let aggregator = Aggregator::new(config.weights);
        let debounce = DebouncePolicy::new(config.debounce_delta_pct);
        let feed = ProgressFeed::new(config.feed_capacity);
        Self {
            store,
            config: Arc::new(config),
            aggregator,
            debounce,
            feed,
        }
    }

    pub fn config(&self) -> &ProgressConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ProgressStore> {
        &self.store
    }

    pub fn feed(&self) -> &ProgressFeed {
        &self.feed
    }

    /// Live stream of every entry appended from now on, on any log.
    pub fn subscribe(&self) -> impl Stream<Item = FeedEntry> + Send + 'static {
        self.feed.subscribe()
    }

    /// Ingests one producer event.
    ///
    /// # Errors
    ///
    /// - [`IngestError::MissingRunId`] / [`IngestError::InvalidStep`]: the
    ///   request was rejected and nothing was appended.
    /// - [`IngestError::Store`]: the store failed. If the failure happened
    ///   after the appends, the event stays in the logs.
    pub async fn push_event(
        &self,
        request: ProgressEventRequest,
        user_header: Option<&str>,
    ) -> IngestResult<IngestAck> {
        let run_id = self.resolve_run_id(&request).await?;
        let event = build_event(&request, &run_id, user_header, Utc::now().timestamp_millis())?;
        self.ingest(&event).await?;
        Ok(IngestAck::ok())
    }

    /// Appends an already normalized event and settles the run.
    pub async fn ingest(&self, event: &ProgressEvent) -> IngestResult<Settlement> {
        let fields = event.to_fields();
        self.append(
            &keys::run_events(&event.run_id),
            fields.clone(),
            self.config.per_run_maxlen,
        )
        .await?;
        self.append(keys::GLOBAL_PROGRESS, fields, self.config.global_maxlen)
            .await?;

        match self.settle(event).await {
            Ok(settlement) => Ok(settlement),
            Err(err) => {
                error!(
                    run_id = %event.run_id,
                    step = %event.current_step,
                    error = %err,
                    "Failed to aggregate ingest progress"
                );
                Err(err.into())
            }
        }
    }

    /// Replays a run's log into its current aggregate without writing.
    pub async fn aggregate_run(&self, run_id: &str) -> StoreResult<Aggregate> {
        let mut entries = self
            .store
            .rev_range(&keys::run_events(run_id), self.config.per_run_maxlen)
            .await?;
        entries.reverse();
        Ok(self.aggregator.aggregate(entries.iter().map(|e| &e.fields)))
    }

    async fn settle(&self, event: &ProgressEvent) -> StoreResult<Settlement> {
        let run_id = event.run_id.as_str();
        let aggregate = self.aggregate_run(run_id).await?;

        let meta_key = keys::run_meta(run_id);
        let prev = RunSnapshot::from_fields(&self.store.hash_get_all(&meta_key).await?);
        let overall_pct = self.debounce.published_overall(prev.as_ref(), &aggregate);
        let current_step = aggregate.current_step.unwrap_or(event.current_step);

        if !self
            .debounce
            .should_write(prev.as_ref(), aggregate.status, current_step, overall_pct)
        {
            debug!(
                run_id,
                overall_pct,
                stored_pct = prev.as_ref().map(|p| p.overall_pct),
                "Snapshot write debounced"
            );
            return Ok(Settlement {
                aggregate,
                overall_pct,
                written: false,
                terminal: false,
            });
        }

        let snapshot = RunSnapshot {
            status: aggregate.status,
            current_step: Some(current_step),
            current_step_pct: aggregate.current_step_pct,
            overall_pct,
            user_id: event.user_id.clone(),
            file_no: event.file_no.clone(),
            file_name: None,
            created_at: None,
            updated_at: Some(DateTime::from_timestamp_millis(event.ts).unwrap_or_else(Utc::now)),
        };
        let written = self
            .store
            .hash_set_monotonic(&meta_key, snapshot.to_fields(), SNAPSHOT_GUARD)
            .await?;
        if !written {
            debug!(
                run_id,
                overall_pct,
                status = %aggregate.status,
                "Snapshot superseded by a newer write"
            );
            return Ok(Settlement {
                aggregate,
                overall_pct,
                written: false,
                terminal: false,
            });
        }

        let user_id = event
            .user_id
            .as_deref()
            .or_else(|| prev.as_ref().and_then(|p| p.user_id.as_deref()));
        let file_no = event
            .file_no
            .as_deref()
            .or_else(|| prev.as_ref().and_then(|p| p.file_no.as_deref()));
        let outcome = RunOutcome {
            run_id,
            user_id,
            file_no,
            status: aggregate.status,
            current_step,
            current_step_pct: aggregate.current_step_pct,
            overall_pct,
            ts: event.ts,
        };
        self.append(
            keys::GLOBAL_PROGRESS,
            outcome.entry(EventType::Snapshot),
            self.config.global_maxlen,
        )
        .await?;

        let mut reached_terminal = false;
        if let Some(entry) = outcome.terminal_entry() {
            let was_active = terminal::cleanup(self.store.as_ref(), &outcome, self.completed_ttl())
                .await?;
            self.append(keys::GLOBAL_PROGRESS, entry, self.config.global_maxlen)
                .await?;
            info!(
                run_id,
                user_id = user_id.unwrap_or_default(),
                status = %aggregate.status,
                was_active,
                "Run reached terminal status"
            );
            reached_terminal = true;
        }

        Ok(Settlement {
            aggregate,
            overall_pct,
            written: true,
            terminal: reached_terminal,
        })
    }

    async fn append(&self, key: &str, fields: Fields, maxlen: usize) -> StoreResult<EntryId> {
        let id = self.store.append(key, fields.clone(), maxlen).await?;
        self.feed.publish(key, StreamEntry { id, fields });
        Ok(id)
    }

    fn completed_ttl(&self) -> Option<Duration> {
        (self.config.completed_ttl_secs > 0)
            .then(|| Duration::from_secs(self.config.completed_ttl_secs))
    }

    /// The explicit run id, or the latest run registered for `fileNo`.
    async fn resolve_run_id(&self, request: &ProgressEventRequest) -> IngestResult<String> {
        if let Some(run_id) = request.run_id.as_deref().map(str::trim) {
            if !run_id.is_empty() {
                return Ok(run_id.to_string());
            }
        }

        let file_no = request.file_no.as_deref().unwrap_or_default();
        if normalize_file_no(file_no).is_none() {
            return Err(IngestError::MissingRunId);
        }
        for candidate in file_key_candidates(file_no) {
            if let Some(run_id) = self.store.get(&keys::file_latest_run(&candidate)).await? {
                if !run_id.is_empty() {
                    debug!(file_no = %candidate, run_id = %run_id, "Resolved runId from fileNo");
                    return Ok(run_id);
                }
            }
        }
        Err(IngestError::MissingRunId)
    }

    /// Registers a new run at upload time and returns its id.
    ///
    /// The run starts `PENDING` on `UPLOAD`, is listed among the user's
    /// active runs, and becomes the latest run of its file.
    pub async fn register_run(
        &self,
        user_id: &str,
        file_no: &str,
        file_name: Option<&str>,
    ) -> IngestResult<String> {
        let user_id = user_id.trim();
        let file_no = file_no.trim();
        if user_id.is_empty() {
            return Err(IngestError::MissingField("userId"));
        }
        if file_no.is_empty() {
            return Err(IngestError::MissingField("fileNo"));
        }

        let run_id = self.store.incr_by(keys::RUN_SEQ, 1).await?.to_string();
        let snapshot = RunSnapshot {
            user_id: Some(user_id.to_string()),
            file_no: Some(file_no.to_string()),
            file_name: file_name
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            ..RunSnapshot::pending(Utc::now())
        };
        self.store
            .hash_set(&keys::run_meta(&run_id), snapshot.to_fields())
            .await?;
        self.store
            .set_add(&keys::user_runs(user_id), &run_id)
            .await?;

        let file_key = normalize_file_no(file_no).unwrap_or_else(|| file_no.to_string());
        self.store
            .set(&keys::file_latest_run(&file_key), &run_id)
            .await?;

        info!(run_id = %run_id, user_id, file_no, "Registered ingest run");
        Ok(run_id)
    }

    /// Last published snapshot of a run; `None` for an unknown run.
    pub async fn snapshot(&self, run_id: &str) -> StoreResult<Option<RunSnapshot>> {
        let fields = self.store.hash_get_all(&keys::run_meta(run_id)).await?;
        Ok(RunSnapshot::from_fields(&fields))
    }

    /// Ids of the user's runs that have not reached a terminal status.
    pub async fn active_runs(&self, user_id: &str) -> StoreResult<Vec<String>> {
        self.store.set_members(&keys::user_runs(user_id)).await
    }

    /// The user's running run that was created most recently.
    pub async fn active_run(&self, user_id: &str) -> StoreResult<Option<(String, RunSnapshot)>> {
        let mut newest: Option<(String, RunSnapshot)> = None;
        for run_id in self.active_runs(user_id).await? {
            let Some(snapshot) = self.snapshot(&run_id).await? else {
                continue;
            };
            if snapshot.status != ProgressStatus::Running {
                continue;
            }
            let is_newer = newest
                .as_ref()
                .map_or(true, |(_, current)| snapshot.created_at > current.created_at);
            if is_newer {
                newest = Some((run_id, snapshot));
            }
        }
        Ok(newest)
    }

    /// Up to `count` entries of a run's log after `after`, oldest first.
    pub async fn events_after(
        &self,
        run_id: &str,
        after: Option<EntryId>,
        count: usize,
    ) -> StoreResult<Vec<StreamEntry>> {
        self.store
            .range_after(&keys::run_events(run_id), after, count)
            .await
    }
}
