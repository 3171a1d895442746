//! # ingest-core
//!
//! Progress event ingestion and aggregation engine.
//!
//! This crate provides:
//! - Configuration loading from the `.ingest-progress/` directory
//! - The stream-and-hash store abstraction and an in-memory backend
//! - Replay of run event logs into weighted aggregates
//! - The ingestion service with debounced snapshots and terminal cleanup
//! - Throttled producer-side progress pushers
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and management
//! - [`store`]: Store trait, key scheme and [`store::MemoryStore`]
//! - [`aggregate`]: Pure replay of a run's log into an aggregate
//! - [`ingest`]: The [`ingest::ProgressService`] write and read paths
//! - [`feed`]: Live broadcast of appended log entries
//! - [`pusher`]: Fire-and-forget progress reporting for pipeline stages

pub mod aggregate;
pub mod config;
pub mod feed;
pub mod ingest;
pub mod pusher;
pub mod store;
