//! Configuration models that aggregate all settings.
//!
//! This module provides the unified `AppConfig` structure that combines the
//! aggregation settings, the producer-side pusher settings and the HTTP
//! server settings into a single configuration object. Every value is
//! immutable once loaded and is injected into the components that use it.

use ingest_protocol::step_models::Step;
use serde::{Deserialize, Serialize};

/// Tolerance used when checking that the step weights sum to one.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Static contribution of each step to the overall percentage.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StepWeights {
    pub upload: f64,
    pub extraction: f64,
    pub chunking: f64,
    pub embedding: f64,
    pub vector_store: f64,
}

impl Default for StepWeights {
    fn default() -> Self {
        Self {
            upload: 0.20,
            extraction: 0.20,
            chunking: 0.10,
            embedding: 0.40,
            vector_store: 0.10,
        }
    }
}

impl StepWeights {
    pub fn weight(&self, step: Step) -> f64 {
        match step {
            Step::Upload => self.upload,
            Step::Extraction => self.extraction,
            Step::Chunking => self.chunking,
            Step::Embedding => self.embedding,
            Step::VectorStore => self.vector_store,
        }
    }

    pub fn sum(&self) -> f64 {
        Step::ALL.iter().map(|step| self.weight(*step)).sum()
    }

    /// Checks that every weight is a finite non-negative number and that
    /// the weights sum to 1.0.
    pub fn validate(&self) -> Result<(), String> {
        for step in Step::ALL {
            let weight = self.weight(step);
            if !weight.is_finite() || weight < 0.0 {
                return Err(format!("weight for {step} must be >= 0, got {weight}"));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(format!("step weights must sum to 1.0, got {sum}"));
        }
        Ok(())
    }
}

/// Settings of the aggregation engine.
///
/// # Example
///
/// ```toml
/// [progress]
/// debounce_delta_pct = 1.0
/// per_run_maxlen = 500
///
/// [progress.weights]
/// embedding = 0.40
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProgressConfig {
    pub weights: StepWeights,

    /// Minimum change of the overall percentage, in percentage points,
    /// that triggers a snapshot write on its own.
    pub debounce_delta_pct: f64,

    /// Upper bound of each per-run event log. Also the replay window.
    pub per_run_maxlen: usize,

    /// Upper bound of the global event log.
    pub global_maxlen: usize,

    /// Expiry applied to a run's keys once it is terminal. 0 keeps them.
    pub completed_ttl_secs: u64,

    /// Buffer of the live feed before slow subscribers start lagging.
    pub feed_capacity: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            weights: StepWeights::default(),
            debounce_delta_pct: 1.0,
            per_run_maxlen: 500,
            global_maxlen: 20_000,
            completed_ttl_secs: 0,
            feed_capacity: 1024,
        }
    }
}

/// Settings of the producer-side progress pusher.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PusherConfig {
    /// Ingestion endpoint the pusher posts to.
    pub endpoint: String,

    /// Minimum percentage change that lets an `advance` through.
    pub min_pct_step: f64,

    /// Minimum time between two `advance` sends regardless of percentage.
    pub min_interval_ms: i64,

    /// Client-side request timeout.
    pub timeout_ms: u64,

    /// Capacity of the background send queue.
    pub queue_capacity: usize,
}

impl Default for PusherConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8000/ingest/progress".to_string(),
            min_pct_step: 1.0,
            min_interval_ms: 1500,
            timeout_ms: 5000,
            queue_capacity: 256,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Unified application configuration loaded from `.ingest-progress/config.toml`.
///
/// # Example
///
/// ```rust,no_run
/// use ingest_core::config::loader::load_config;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("."))?;
/// println!("Debounce threshold: {}", config.progress.debounce_delta_pct);
/// # Ok(())
/// # }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub progress: ProgressConfig,
    pub pusher: PusherConfig,
    pub server: ServerConfig,
}
