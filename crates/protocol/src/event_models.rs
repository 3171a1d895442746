//! Progress event models and their stream encoding.
//!
//! Events arrive as [`ProgressEventRequest`] bodies with every field
//! optional, are normalized into [`ProgressEvent`], and are stored as flat
//! string maps ([`Fields`]) in append-only streams. Empty strings stand for
//! absent values in the flat encoding.

use crate::step_models::{EventType, ProgressStatus, Step};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

/// Flat field map of one stream entry or hash record.
pub type Fields = BTreeMap<String, String>;

/// Field names used in stream entries and snapshot hashes.
pub mod field {
    pub const EVENT_TYPE: &str = "eventType";
    pub const RUN_ID: &str = "runId";
    pub const USER_ID: &str = "userId";
    pub const FILE_NO: &str = "fileNo";
    pub const FILE_NAME: &str = "fileName";
    pub const CURRENT_STEP: &str = "currentStep";
    pub const STATUS: &str = "status";
    pub const PROCESSED: &str = "processed";
    pub const TOTAL: &str = "total";
    pub const TS: &str = "ts";
    pub const PROGRESS_PCT: &str = "progressPct";
    pub const OVERALL_PCT: &str = "overallPct";
    pub const CREATED_AT: &str = "createdAt";
    pub const UPDATED_AT: &str = "updatedAt";

    /// Older producers wrote the step under this name.
    pub const LEGACY_STEP: &str = "step";

    /// Older producers wrote the timestamp under this name.
    pub const LEGACY_TS: &str = "timestamp";
}

/// Percentage in the fixed six-decimal form stored in streams and hashes.
pub fn format_pct(pct: f64) -> String {
    format!("{pct:.6}")
}

/// Reads a field, treating a missing key and an empty value alike.
pub fn non_empty<'a>(fields: &'a Fields, name: &str) -> Option<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Raw progress report as posted by a pipeline stage.
///
/// Every field is optional on the wire; validation happens at ingestion.
///
/// # Example
///
/// ```json
/// {
///   "runId": "42",
///   "currentStep": "EMBEDDING",
///   "status": "RUNNING",
///   "processed": 3,
///   "total": 10
/// }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEventRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_no: Option<String>,

    /// `UPLOAD|EXTRACTION|CHUNKING|EMBEDDING|VECTOR_STORE`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    /// `PENDING|RUNNING|COMPLETED|FAILED`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub processed: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub total: Option<u64>,

    /// Inferred from `status` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// Epoch milliseconds; the server stamps its own clock when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "number | null")]
    pub ts: Option<i64>,
}

/// A validated, normalized progress event.
///
/// Immutable once appended to a log. `processed` and `total` are the
/// producer's last known values for the step, not deltas.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub event_type: EventType,
    pub run_id: String,
    pub user_id: Option<String>,
    pub file_no: Option<String>,
    pub current_step: Step,
    pub status: Option<ProgressStatus>,
    #[ts(type = "number | null")]
    pub processed: Option<u64>,
    #[ts(type = "number | null")]
    pub total: Option<u64>,
    #[ts(type = "number")]
    pub ts: i64,
}

impl ProgressEvent {
    /// Flat encoding written to the event streams.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::EVENT_TYPE.into(), self.event_type.as_str().into());
        fields.insert(field::RUN_ID.into(), self.run_id.clone());
        fields.insert(
            field::USER_ID.into(),
            self.user_id.clone().unwrap_or_default(),
        );
        fields.insert(
            field::FILE_NO.into(),
            self.file_no.clone().unwrap_or_default(),
        );
        fields.insert(
            field::CURRENT_STEP.into(),
            self.current_step.as_str().into(),
        );
        fields.insert(
            field::STATUS.into(),
            self.status.map(|s| s.as_str().to_string()).unwrap_or_default(),
        );
        fields.insert(
            field::PROCESSED.into(),
            self.processed.map(|n| n.to_string()).unwrap_or_default(),
        );
        fields.insert(
            field::TOTAL.into(),
            self.total.map(|n| n.to_string()).unwrap_or_default(),
        );
        fields.insert(field::TS.into(), self.ts.to_string());
        fields
    }

    /// Decode an entry written by [`ProgressEvent::to_fields`].
    ///
    /// Returns `None` when the run id, step, event type or timestamp is
    /// missing or unrecognized. Unparsable counters and statuses decode as
    /// absent.
    pub fn from_fields(fields: &Fields) -> Option<ProgressEvent> {
        let run_id = non_empty(fields, field::RUN_ID)?.to_string();
        let current_step = Step::parse(non_empty(fields, field::CURRENT_STEP)?).known()?;
        let event_type = EventType::parse(non_empty(fields, field::EVENT_TYPE)?).known()?;
        let ts = non_empty(fields, field::TS)?.parse().ok()?;

        Some(ProgressEvent {
            event_type,
            run_id,
            user_id: non_empty(fields, field::USER_ID).map(str::to_string),
            file_no: non_empty(fields, field::FILE_NO).map(str::to_string),
            current_step,
            status: non_empty(fields, field::STATUS).and_then(|s| ProgressStatus::parse(s).known()),
            processed: non_empty(fields, field::PROCESSED).and_then(|s| s.parse().ok()),
            total: non_empty(fields, field::TOTAL).and_then(|s| s.parse().ok()),
            ts,
        })
    }
}

/// Identifier of a stream entry: `<milliseconds>-<sequence>`.
///
/// Ids are strictly increasing within one stream, so they order entries by
/// arrival.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId {
    pub ms: u64,
    pub seq: u64,
}

impl EntryId {
    pub fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// Error returned when a string is not a valid `<ms>-<seq>` entry id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEntryIdError(String);

impl fmt::Display for ParseEntryIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid stream entry id: {:?}", self.0)
    }
}

impl std::error::Error for ParseEntryIdError {}

impl FromStr for EntryId {
    type Err = ParseEntryIdError;

    /// Accepts `<ms>-<seq>` or a bare `<ms>` (sequence 0).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseEntryIdError(s.to_string());
        let (ms, seq) = match s.split_once('-') {
            Some((ms, seq)) => (ms, seq),
            None => (s, "0"),
        };
        Ok(EntryId {
            ms: ms.parse().map_err(|_| err())?,
            seq: seq.parse().map_err(|_| err())?,
        })
    }
}

impl Serialize for EntryId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntryId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One entry of an append-only stream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct StreamEntry {
    #[ts(type = "string")]
    pub id: EntryId,
    pub fields: Fields,
}

/// A stream entry as published to live subscribers, tagged with the
/// stream it was appended to.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, TS)]
pub struct FeedEntry {
    pub key: String,
    pub entry: StreamEntry,
}
