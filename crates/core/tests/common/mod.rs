//! Common test utilities shared by the integration suites.
//!
//! This module provides:
//! - Fixtures (services over an in-memory store, request builders)
//! - Custom assertions over the global log
//! - A recording sink for pushers
//! - A store that stalls its first snapshot write

pub mod assertions;
pub mod fixtures;
pub mod recording_sink;
pub mod slow_store;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;
#[allow(unused_imports)]
pub use recording_sink::*;
#[allow(unused_imports)]
pub use slow_store::*;
