//! Error types for the ingestion service.

use crate::store::StoreError;
use thiserror::Error;

/// Errors that can occur while ingesting an event or registering a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// No run id was given and none could be resolved from `fileNo`.
    #[error("runId is required (or provide a fileNo that can be resolved to an existing run)")]
    MissingRunId,

    /// `currentStep` is missing or names no known pipeline step.
    #[error("currentStep is required and must be valid, got {0:?}")]
    InvalidStep(String),

    /// A required registration field was blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The store failed after validation passed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IngestError {
    /// `true` for errors caused by the request itself. Nothing has been
    /// appended when a client error is returned.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, IngestError::Store(_))
    }
}

/// Type alias for Result with IngestError.
pub type IngestResult<T> = Result<T, IngestError>;
