//! Event ingestion: validation, logging, debounced snapshots and terminal
//! cleanup.

pub mod debounce;
pub mod error;
pub mod normalize;
pub mod service;
pub mod terminal;

pub use debounce::DebouncePolicy;
pub use error::{IngestError, IngestResult};
pub use service::{ProgressService, Settlement};
