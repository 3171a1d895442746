//! Assertion helpers over the logs held by a [`MemoryStore`].

use ingest_core::store::{keys, MemoryStore, ProgressStore};
use ingest_protocol::event_models::{field, StreamEntry};

/// Every entry of the global log, oldest first.
#[allow(dead_code)]
pub async fn global_entries(store: &MemoryStore) -> Vec<StreamEntry> {
    store
        .range_after(keys::GLOBAL_PROGRESS, None, usize::MAX)
        .await
        .expect("Failed to read global log")
}

/// Global log entries of one event type for one run.
#[allow(dead_code)]
pub async fn global_entries_of(store: &MemoryStore, run_id: &str, event_type: &str) -> Vec<StreamEntry> {
    global_entries(store)
        .await
        .into_iter()
        .filter(|e| {
            e.fields.get(field::RUN_ID).map(String::as_str) == Some(run_id)
                && e.fields.get(field::EVENT_TYPE).map(String::as_str) == Some(event_type)
        })
        .collect()
}

/// Assert that a sequence of percentages never decreases.
#[allow(dead_code)]
pub fn assert_non_decreasing(values: &[f64]) {
    for pair in values.windows(2) {
        assert!(
            pair[1] >= pair[0],
            "percentage went backwards: {} -> {} in {:?}",
            pair[0],
            pair[1],
            values
        );
    }
}
