//! Configuration loading and management.
//!
//! This module provides functionality to load and validate the
//! `.ingest-progress/config.toml` file and the environment overrides used by
//! progress pushers.

pub mod error;
pub mod loader;
pub mod models;
