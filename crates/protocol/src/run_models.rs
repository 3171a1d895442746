//! Run-level progress models.
//!
//! A run is one document's traversal of the pipeline. Its [`Aggregate`] is
//! recomputed from the event log on every event; its [`RunSnapshot`] is the
//! last aggregate that was actually published.

use crate::event_models::{field, format_pct, non_empty, Fields};
use crate::step_models::{ProgressStatus, Step};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

/// Derived progress of a run at one point in time.
///
/// `per_step_pct` always holds all five steps, keyed in pipeline order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub per_step_pct: BTreeMap<Step, f64>,

    /// Weighted overall completion in `[0, 100]`.
    pub overall_pct: f64,

    pub current_step: Option<Step>,

    /// Percentage of `current_step`, or 0 when there is none.
    pub current_step_pct: f64,

    pub status: ProgressStatus,
}

impl Aggregate {
    /// Percentage of a single step.
    pub fn step_pct(&self, step: Step) -> f64 {
        self.per_step_pct.get(&step).copied().unwrap_or(0.0)
    }
}

/// Last published progress of a run, as stored in the run's meta hash.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TS)]
#[serde(rename_all = "camelCase")]
pub struct RunSnapshot {
    pub status: ProgressStatus,
    pub current_step: Option<Step>,
    pub current_step_pct: f64,
    pub overall_pct: f64,
    pub user_id: Option<String>,
    pub file_no: Option<String>,
    pub file_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl RunSnapshot {
    /// A freshly registered run that has not reported any progress.
    pub fn pending(now: DateTime<Utc>) -> Self {
        Self {
            status: ProgressStatus::Pending,
            current_step: Some(Step::Upload),
            current_step_pct: 0.0,
            overall_pct: 0.0,
            user_id: None,
            file_no: None,
            file_name: None,
            created_at: Some(now),
            updated_at: Some(now),
        }
    }

    /// Hash fields for this snapshot. Absent optional values are left out
    /// so that a partial write never clears what is already stored.
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::STATUS.into(), self.status.as_str().into());
        if let Some(step) = self.current_step {
            fields.insert(field::CURRENT_STEP.into(), step.as_str().into());
        }
        fields.insert(
            field::PROGRESS_PCT.into(),
            format_pct(self.current_step_pct),
        );
        fields.insert(field::OVERALL_PCT.into(), format_pct(self.overall_pct));
        let optional = [
            (field::USER_ID, &self.user_id),
            (field::FILE_NO, &self.file_no),
            (field::FILE_NAME, &self.file_name),
        ];
        for (name, value) in optional {
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                fields.insert(name.into(), value.clone());
            }
        }
        if let Some(created_at) = self.created_at {
            fields.insert(field::CREATED_AT.into(), created_at.to_rfc3339());
        }
        if let Some(updated_at) = self.updated_at {
            fields.insert(field::UPDATED_AT.into(), updated_at.to_rfc3339());
        }
        fields
    }

    /// Decode a meta hash. Returns `None` for an empty hash (unknown run).
    ///
    /// Unparsable values fall back to their defaults instead of failing the
    /// whole record.
    pub fn from_fields(fields: &Fields) -> Option<RunSnapshot> {
        if fields.is_empty() {
            return None;
        }
        let pct = |name| {
            non_empty(fields, name)
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        let time = |name| {
            non_empty(fields, name)
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|t| t.with_timezone(&Utc))
        };
        let text = |name| non_empty(fields, name).map(str::to_string);

        Some(RunSnapshot {
            status: non_empty(fields, field::STATUS)
                .and_then(|s| ProgressStatus::parse(s).known())
                .unwrap_or(ProgressStatus::Pending),
            current_step: non_empty(fields, field::CURRENT_STEP)
                .and_then(|s| Step::parse(s).known()),
            current_step_pct: pct(field::PROGRESS_PCT),
            overall_pct: pct(field::OVERALL_PCT),
            user_id: text(field::USER_ID),
            file_no: text(field::FILE_NO),
            file_name: text(field::FILE_NAME),
            created_at: time(field::CREATED_AT),
            updated_at: time(field::UPDATED_AT),
        })
    }
}
