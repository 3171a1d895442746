//! Request and response bodies of the HTTP boundary.
//!
//! The ingestion endpoint answers with [`IngestAck`] on success and
//! [`ErrorResponse`] on failure. The remaining types back the read-side
//! endpoints used by polling clients.

use crate::event_models::StreamEntry;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Acknowledgement returned for an accepted progress event.
///
/// ```json
/// {"status": "OK"}
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct IngestAck {
    pub status: String,
}

impl IngestAck {
    pub fn ok() -> Self {
        Self {
            status: "OK".to_string(),
        }
    }
}

/// Error envelope shared by every endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    /// HTTP status code, repeated in the body.
    pub status: u16,

    /// Machine readable code, e.g. `BAD_REQUEST` or `INTERNAL_ERROR`.
    pub code: String,

    pub message: String,

    /// Always `false`.
    pub is_success: bool,

    /// Always an empty object.
    #[ts(type = "Record<string, never>")]
    pub result: serde_json::Value,
}

impl ErrorResponse {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            is_success: false,
            result: serde_json::Value::Object(serde_json::Map::new()),
        }
    }
}

/// Upload-time registration of a new run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRunRequest {
    /// Falls back to the `x-user-uuid` header when absent or blank.
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub file_no: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRunResponse {
    pub run_id: String,
}

/// Runs that have not reached a terminal status yet.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRunsResponse {
    pub user_id: String,
    pub run_ids: Vec<String>,
}

/// A page of a run's event log, oldest entry first.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct EventsResponse {
    pub run_id: String,
    pub entries: Vec<StreamEntry>,
}
