//! Configuration file loader for the `.ingest-progress/` directory.
//!
//! This module provides functionality to load:
//! - `config.toml`: aggregation, pusher and server settings
//! - `PROGRESS_*` environment variables: overrides used by pushers that run
//!   inside pipeline stages without a config directory

use crate::config::error::ConfigError;
use crate::config::error::ConfigResult;
use crate::config::models::{AppConfig, PusherConfig};
use std::path::Path;
use tracing::warn;

/// Directory holding the configuration file, relative to the project root.
pub const CONFIG_DIR: &str = ".ingest-progress";

/// Environment variable overriding [`PusherConfig::endpoint`].
pub const ENV_ENDPOINT: &str = "PROGRESS_ENDPOINT";

/// Environment variable overriding [`PusherConfig::min_pct_step`].
pub const ENV_MIN_PERCENT_STEP: &str = "PROGRESS_MIN_PERCENT_STEP";

/// Environment variable overriding [`PusherConfig::min_interval_ms`].
pub const ENV_MIN_INTERVAL_MS: &str = "PROGRESS_MIN_INTERVAL_MS";

/// Loads the configuration from `<root>/.ingest-progress/config.toml`.
///
/// # Returns
///
/// An `AppConfig` with every setting that is not present in the file left
/// at its default. A missing directory or file yields the defaults rather
/// than an error.
///
/// # Errors
///
/// Returns `ConfigError` if:
/// - The file exists but cannot be read
/// - The file is not valid TOML or has unknown keys
/// - The step weights do not sum to 1.0
pub fn load_config(root: &Path) -> ConfigResult<AppConfig> {
    let config_path = root.join(CONFIG_DIR).join("config.toml");

    if !config_path.exists() {
        return Ok(AppConfig::default());
    }

    load_config_file(&config_path)
}

/// Loads and validates a single TOML configuration file.
pub fn load_config_file(config_path: &Path) -> ConfigResult<AppConfig> {
    let content =
        std::fs::read_to_string(config_path).map_err(|source| ConfigError::FileRead {
            path: config_path.to_path_buf(),
            source,
        })?;

    let config: AppConfig =
        toml::from_str(&content).map_err(|source| ConfigError::TomlParse {
            path: config_path.to_path_buf(),
            source,
        })?;

    validate(&config).map_err(|reason| ConfigError::InvalidConfig {
        path: config_path.to_path_buf(),
        reason,
    })?;

    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), String> {
    config.progress.weights.validate()?;
    if !config.progress.debounce_delta_pct.is_finite() || config.progress.debounce_delta_pct < 0.0
    {
        return Err("debounce_delta_pct must be a non-negative number".to_string());
    }
    if config.progress.feed_capacity == 0 {
        return Err("feed_capacity must be at least 1".to_string());
    }
    if config.pusher.queue_capacity == 0 {
        return Err("pusher queue_capacity must be at least 1".to_string());
    }
    Ok(())
}

/// Pusher settings from the process environment, on top of the defaults.
pub fn pusher_config_from_env() -> PusherConfig {
    pusher_config_from_lookup(PusherConfig::default(), |name| std::env::var(name).ok())
}

/// Applies `PROGRESS_*` overrides obtained through `lookup` to `base`.
///
/// Values that do not parse are ignored with a warning so a misconfigured
/// stage still reports progress with sane throttling.
pub fn pusher_config_from_lookup<F>(base: PusherConfig, lookup: F) -> PusherConfig
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = base;

    if let Some(endpoint) = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
        config.endpoint = endpoint.trim().to_string();
    }

    if let Some(raw) = lookup(ENV_MIN_PERCENT_STEP) {
        match raw.trim().parse::<f64>() {
            Ok(step) if step.is_finite() && step >= 0.0 => config.min_pct_step = step,
            _ => warn!(
                variable = ENV_MIN_PERCENT_STEP,
                value = %raw,
                "ignoring invalid pusher setting"
            ),
        }
    }

    if let Some(raw) = lookup(ENV_MIN_INTERVAL_MS) {
        match raw.trim().parse::<i64>() {
            Ok(interval) if interval >= 0 => config.min_interval_ms = interval,
            _ => warn!(
                variable = ENV_MIN_INTERVAL_MS,
                value = %raw,
                "ignoring invalid pusher setting"
            ),
        }
    }

    config
}
