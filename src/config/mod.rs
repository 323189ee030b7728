// src/config/mod.rs

//! Configuration loading and validation for the results tracker.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate and parse it into an immutable `TrackerConfig` (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    DEFAULT_CONFIG_PATH, get_logging_config_path, load_and_validate, load_from_path,
};
pub use model::{
    DatabaseSection, MessagingSection, RawConfigFile, ResultsTrackerSection, TrackerConfig,
    TrackerSection, TrackerSettings,
};
pub use validate::{parse_duration, validate_config};
