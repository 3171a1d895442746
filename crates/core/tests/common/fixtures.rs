//! Test fixtures for building services and requests.

use ingest_core::config::models::ProgressConfig;
use ingest_core::ingest::ProgressService;
use ingest_core::store::MemoryStore;
use ingest_protocol::event_models::ProgressEventRequest;
use std::sync::Arc;

/// A service over a fresh in-memory store with default settings.
#[allow(dead_code)]
pub fn create_test_service() -> (ProgressService, Arc<MemoryStore>) {
    create_test_service_with(ProgressConfig::default())
}

#[allow(dead_code)]
pub fn create_test_service_with(config: ProgressConfig) -> (ProgressService, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    (ProgressService::new(store.clone(), config), store)
}

/// A progress report for `run_id` as a pipeline stage would send it.
#[allow(dead_code)]
pub fn step_event(
    run_id: &str,
    step: &str,
    status: &str,
    processed: u64,
    total: u64,
) -> ProgressEventRequest {
    ProgressEventRequest {
        run_id: Some(run_id.to_string()),
        user_id: Some("user-1".to_string()),
        current_step: Some(step.to_string()),
        status: Some(status.to_string()),
        processed: Some(processed),
        total: Some(total),
        ..ProgressEventRequest::default()
    }
}

/// Same as [`step_event`] with an explicit producer timestamp.
#[allow(dead_code)]
pub fn step_event_at(
    run_id: &str,
    step: &str,
    status: &str,
    processed: u64,
    total: u64,
    ts: i64,
) -> ProgressEventRequest {
    ProgressEventRequest {
        ts: Some(ts),
        ..step_event(run_id, step, status, processed, total)
    }
}
