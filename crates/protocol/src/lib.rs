//! # ingest-protocol
//!
//! Core protocol definitions and data models for ingest-progress.
//!
//! This crate defines all shared data structures used for:
//! - Progress events reported by pipeline stages
//! - Run snapshots and aggregates published to clients
//! - The flat field encoding used by the stream-and-hash store
//! - Request and response bodies of the HTTP boundary
//!
//! ## Modules
//!
//! - [`step_models`]: Pipeline steps, statuses, event types and their parsing
//! - [`event_models`]: Progress events, stream entries and field codec
//! - [`run_models`]: Run snapshots and aggregates
//! - [`http_models`]: Acknowledgements, errors and read-side responses
//!
//! ## Design Principles
//!
//! - Minimal dependencies: Only serde, ts-rs and chrono
//! - TypeScript generation: Wire types derive `TS` for client compatibility
//! - Independent compilation: No dependencies on other ingest-progress crates

pub mod event_models;
pub mod http_models;
pub mod run_models;
pub mod step_models;

// Re-export all public types for convenience
pub use event_models::*;
pub use http_models::*;
pub use run_models::*;
pub use step_models::*;
