//! Teardown of runs that reached a terminal status.
//!
//! Cleanup is not transactional with aggregation. Two events settling the
//! same run concurrently may both emit a terminal entry, so consumers of the
//! global log must treat `RUN_COMPLETED`/`RUN_FAILED` as idempotent per run.

use crate::ingest::normalize::file_key_candidates;
use crate::store::{keys, ProgressStore, StoreResult};
use ingest_protocol::event_models::{field, format_pct, Fields};
use ingest_protocol::step_models::{EventType, ProgressStatus, Step};
use std::time::Duration;
use tracing::debug;

/// What is known about a run at the moment it turned terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome<'a> {
    pub run_id: &'a str,
    pub user_id: Option<&'a str>,
    pub file_no: Option<&'a str>,
    pub status: ProgressStatus,
    pub current_step: Step,
    pub current_step_pct: f64,
    pub overall_pct: f64,
    pub ts: i64,
}

impl RunOutcome<'_> {
    /// Flat entry of the given type describing this outcome.
    pub fn entry(&self, event_type: EventType) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::EVENT_TYPE.into(), event_type.as_str().into());
        fields.insert(field::RUN_ID.into(), self.run_id.into());
        fields.insert(field::USER_ID.into(), self.user_id.unwrap_or_default().into());
        fields.insert(field::FILE_NO.into(), self.file_no.unwrap_or_default().into());
        fields.insert(field::CURRENT_STEP.into(), self.current_step.as_str().into());
        fields.insert(field::STATUS.into(), self.status.as_str().into());
        fields.insert(field::PROGRESS_PCT.into(), format_pct(self.current_step_pct));
        fields.insert(field::OVERALL_PCT.into(), format_pct(self.overall_pct));
        fields.insert(field::TS.into(), self.ts.to_string());
        fields
    }

    /// The `RUN_COMPLETED`/`RUN_FAILED` entry, or `None` for a run that is
    /// still in progress.
    pub fn terminal_entry(&self) -> Option<Fields> {
        EventType::for_terminal(self.status).map(|event_type| {
            let mut outcome = self.clone();
            if self.status == ProgressStatus::Completed {
                outcome.overall_pct = 100.0;
            }
            outcome.entry(event_type)
        })
    }
}

/// Removes a terminal run from its owner's active set and schedules its
/// keys for expiry when `ttl` is set.
///
/// Returns `true` if the run was still listed as active.
pub async fn cleanup(
    store: &dyn ProgressStore,
    outcome: &RunOutcome<'_>,
    ttl: Option<Duration>,
) -> StoreResult<bool> {
    let mut was_active = false;
    if let Some(user_id) = outcome.user_id {
        was_active = store
            .set_remove(&keys::user_runs(user_id), outcome.run_id)
            .await?;
    }

    if let Some(ttl) = ttl {
        let mut expiring = vec![
            keys::run_meta(outcome.run_id),
            keys::run_events(outcome.run_id),
        ];
        if let Some(file_no) = outcome.file_no {
            expiring.extend(
                file_key_candidates(file_no)
                    .into_iter()
                    .map(|candidate| keys::file_latest_run(&candidate)),
            );
        }
        for key in &expiring {
            store.expire(key, ttl).await?;
        }
        debug!(
            run_id = outcome.run_id,
            ttl_secs = ttl.as_secs(),
            keys = ?expiring,
            "Set expiry on terminal run"
        );
    }

    Ok(was_active)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn outcome(status: ProgressStatus) -> RunOutcome<'static> {
        RunOutcome {
            run_id: "9",
            user_id: Some("u-1"),
            file_no: Some("f-1"),
            status,
            current_step: Step::VectorStore,
            current_step_pct: 100.0,
            overall_pct: 99.5,
            ts: 1234,
        }
    }

    #[test]
    fn test_terminal_entry_for_completed_run() {
        let fields = outcome(ProgressStatus::Completed).terminal_entry().unwrap();
        assert_eq!(fields[field::EVENT_TYPE], "RUN_COMPLETED");
        assert_eq!(fields[field::OVERALL_PCT], "100.000000");
        assert_eq!(fields[field::CURRENT_STEP], "VECTOR_STORE");
        assert_eq!(fields[field::TS], "1234");
    }

    #[test]
    fn test_terminal_entry_for_failed_run_keeps_overall() {
        let fields = outcome(ProgressStatus::Failed).terminal_entry().unwrap();
        assert_eq!(fields[field::EVENT_TYPE], "RUN_FAILED");
        assert_eq!(fields[field::OVERALL_PCT], "99.500000");
    }

    #[test]
    fn test_no_terminal_entry_while_running() {
        assert!(outcome(ProgressStatus::Running).terminal_entry().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_removes_run_from_user_index() {
        let store = MemoryStore::new();
        store.set_add(&keys::user_runs("u-1"), "9").await.unwrap();
        store.set_add(&keys::user_runs("u-1"), "10").await.unwrap();

        let removed = cleanup(&store, &outcome(ProgressStatus::Completed), None)
            .await
            .unwrap();

        assert!(removed);
        assert_eq!(
            store.set_members(&keys::user_runs("u-1")).await.unwrap(),
            vec!["10".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_applies_ttl() {
        let store = MemoryStore::new();
        let mut meta = Fields::new();
        meta.insert(field::STATUS.into(), "COMPLETED".into());
        store.hash_set(&keys::run_meta("9"), meta).await.unwrap();
        store.set(&keys::file_latest_run("f-1"), "9").await.unwrap();

        cleanup(
            &store,
            &outcome(ProgressStatus::Completed),
            Some(Duration::from_secs(30)),
        )
        .await
        .unwrap();

        assert!(store.exists(&keys::run_meta("9")).await);
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(!store.exists(&keys::run_meta("9")).await);
        assert!(!store.exists(&keys::file_latest_run("f-1")).await);
    }
}
