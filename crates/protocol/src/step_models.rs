//! Pipeline step, status and event type models.
//!
//! Producers send these values as free-form strings. Parsing is total:
//! every input yields either a known variant or [`Parsed::Unrecognized`]
//! carrying the original text, so callers have to decide what to do with
//! values they do not understand.

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

/// Result of parsing a free-form producer value into a typed variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    /// The value maps onto a known variant.
    Known(T),

    /// The value does not map onto any known variant. Holds the raw input.
    Unrecognized(String),
}

impl<T> Parsed<T> {
    /// Returns the known variant, discarding unrecognized input.
    pub fn known(self) -> Option<T> {
        match self {
            Parsed::Known(value) => Some(value),
            Parsed::Unrecognized(_) => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Parsed::Known(_))
    }
}

/// Case and separator insensitive form of a producer token.
///
/// `" vector-store "` and `"Vector Store"` both become `"VECTOR_STORE"`.
fn normalize_token(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .replace(|c: char| c == '-' || c == ' ', "_")
}

/// One of the five fixed stages a document moves through.
///
/// Declaration order is pipeline order; `Ord` follows it.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TS,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Upload,
    Extraction,
    Chunking,
    Embedding,
    VectorStore,
}

impl Step {
    /// All steps in pipeline order.
    pub const ALL: [Step; 5] = [
        Step::Upload,
        Step::Extraction,
        Step::Chunking,
        Step::Embedding,
        Step::VectorStore,
    ];

    /// The last step of the pipeline.
    pub const LAST: Step = Step::VectorStore;

    /// Wire name of the step.
    pub fn as_str(self) -> &'static str {
        match self {
            Step::Upload => "UPLOAD",
            Step::Extraction => "EXTRACTION",
            Step::Chunking => "CHUNKING",
            Step::Embedding => "EMBEDDING",
            Step::VectorStore => "VECTOR_STORE",
        }
    }

    /// Position of the step in pipeline order.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Parse a producer-supplied step name.
    ///
    /// # Example
    ///
    /// ```
    /// use ingest_protocol::{Parsed, Step};
    ///
    /// assert_eq!(Step::parse("vector-store"), Parsed::Known(Step::VectorStore));
    /// assert!(!Step::parse("BOGUS").is_known());
    /// ```
    pub fn parse(raw: &str) -> Parsed<Step> {
        let token = normalize_token(raw);
        Step::ALL
            .into_iter()
            .find(|step| step.as_str() == token)
            .map_or_else(|| Parsed::Unrecognized(raw.to_string()), Parsed::Known)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single step, or of a whole run.
///
/// The status progresses through these states during normal execution:
/// Pending -> Running -> Completed
///
/// Failed may be reached from any state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProgressStatus {
    /// Nothing has been observed yet.
    Pending,

    /// Work is under way.
    Running,

    /// Finished successfully.
    Completed,

    /// Finished with an error.
    Failed,
}

impl ProgressStatus {
    pub const ALL: [ProgressStatus; 4] = [
        ProgressStatus::Pending,
        ProgressStatus::Running,
        ProgressStatus::Completed,
        ProgressStatus::Failed,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ProgressStatus::Pending => "PENDING",
            ProgressStatus::Running => "RUNNING",
            ProgressStatus::Completed => "COMPLETED",
            ProgressStatus::Failed => "FAILED",
        }
    }

    /// `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, ProgressStatus::Completed | ProgressStatus::Failed)
    }

    pub fn parse(raw: &str) -> Parsed<ProgressStatus> {
        let token = normalize_token(raw);
        ProgressStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == token)
            .map_or_else(|| Parsed::Unrecognized(raw.to_string()), Parsed::Known)
    }
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of entry written to the event logs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    StepStart,
    StepUpdate,
    StepEnd,

    /// Run-level marker emitted once a run aggregates to `Completed`.
    RunCompleted,

    /// Run-level marker emitted once a run aggregates to `Failed`.
    RunFailed,

    /// Derived entry written to the global log whenever the run snapshot
    /// is rewritten.
    Snapshot,
}

impl EventType {
    pub const ALL: [EventType; 6] = [
        EventType::StepStart,
        EventType::StepUpdate,
        EventType::StepEnd,
        EventType::RunCompleted,
        EventType::RunFailed,
        EventType::Snapshot,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::StepStart => "STEP_START",
            EventType::StepUpdate => "STEP_UPDATE",
            EventType::StepEnd => "STEP_END",
            EventType::RunCompleted => "RUN_COMPLETED",
            EventType::RunFailed => "RUN_FAILED",
            EventType::Snapshot => "SNAPSHOT",
        }
    }

    pub fn parse(raw: &str) -> Parsed<EventType> {
        let token = normalize_token(raw);
        EventType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == token)
            .map_or_else(|| Parsed::Unrecognized(raw.to_string()), Parsed::Known)
    }

    /// Event type for a producer event that did not carry one.
    pub fn infer(status: Option<ProgressStatus>) -> EventType {
        match status {
            Some(ProgressStatus::Completed) | Some(ProgressStatus::Failed) => EventType::StepEnd,
            _ => EventType::StepUpdate,
        }
    }

    /// Run-level terminal marker for a terminal run status.
    pub fn for_terminal(status: ProgressStatus) -> Option<EventType> {
        match status {
            ProgressStatus::Completed => Some(EventType::RunCompleted),
            ProgressStatus::Failed => Some(EventType::RunFailed),
            _ => None,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
