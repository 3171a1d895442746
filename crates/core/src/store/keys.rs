//! Key scheme shared by every component that touches the store.

/// Global log receiving a copy of every event and every derived entry.
pub const GLOBAL_PROGRESS: &str = "ingest:progress";

/// Counter allocating run ids at registration.
pub const RUN_SEQ: &str = "ingest:run:seq";

/// Per-run append-only event log.
pub fn run_events(run_id: &str) -> String {
    format!("ingest:run:{run_id}:events")
}

/// Per-run snapshot hash.
pub fn run_meta(run_id: &str) -> String {
    format!("ingest:run:{run_id}:meta")
}

/// Set of a user's runs that have not reached a terminal status.
pub fn user_runs(user_id: &str) -> String {
    format!("ingest:user:{user_id}:runs")
}

/// Latest run registered for a file.
pub fn file_latest_run(file_no: &str) -> String {
    format!("ingest:file:{file_no}:latest_run_id")
}
