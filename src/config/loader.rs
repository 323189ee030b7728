// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{RawConfigFile, TrackerConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] to get
/// a usable [`TrackerConfig`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks counts, durations, backoff bounds and backend urls.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<TrackerConfig> {
    let raw_config = load_from_path(&path)?;
    let config = TrackerConfig::try_from(raw_config)?;
    Ok(config)
}

/// Location of the logging configuration file for an already loaded config.
pub fn get_logging_config_path(config: &TrackerConfig) -> &Path {
    config.logging_config_path()
}

/// Default config location when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/st2/resultstracker.toml";
