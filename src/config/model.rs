// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::engine::backoff::Backoff;
use crate::types::{BackendUrl, ExhaustedRetryPolicy};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [resultstracker]
/// logging = "/etc/st2/logging.resultstracker.conf"
///
/// [database]
/// connection = "file:///var/lib/st2/executions"
///
/// [messaging]
/// endpoint = "file:///var/spool/st2/results"
///
/// [tracker]
/// worker_pool_size = 8
/// visibility_timeout = "30s"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub resultstracker: ResultsTrackerSection,

    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub messaging: MessagingSection,

    #[serde(default)]
    pub tracker: TrackerSection,
}

/// `[resultstracker]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ResultsTrackerSection {
    /// Location of the logging configuration file.
    #[serde(default = "default_logging_path")]
    pub logging: String,
}

fn default_logging_path() -> String {
    "/etc/st2/logging.resultstracker.conf".to_string()
}

impl Default for ResultsTrackerSection {
    fn default() -> Self {
        Self {
            logging: default_logging_path(),
        }
    }
}

/// `[database]` section: where execution records live.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_backend_url")]
    pub connection: String,
}

/// `[messaging]` section: where status updates come from.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagingSection {
    #[serde(default = "default_backend_url")]
    pub endpoint: String,
}

fn default_backend_url() -> String {
    "memory://".to_string()
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            connection: default_backend_url(),
        }
    }
}

impl Default for MessagingSection {
    fn default() -> Self {
        Self {
            endpoint: default_backend_url(),
        }
    }
}

/// `[tracker]` section: worker pool, retry and shutdown tuning.
///
/// Durations are strings like `"250ms"`, `"30s"`, `"5m"`.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerSection {
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout: String,

    /// Read-evaluate-write attempts per message before giving up on a
    /// contended record.
    #[serde(default = "default_max_reconcile_attempts")]
    pub max_reconcile_attempts: u32,

    /// In-batch retry rounds for messages that failed with a retryable error.
    #[serde(default = "default_max_batch_retries")]
    pub max_batch_retries: u32,

    #[serde(default)]
    pub exhausted_retry_policy: ExhaustedRetryPolicy,

    #[serde(default = "default_backoff_base")]
    pub backoff_base: String,

    #[serde(default = "default_backoff_max")]
    pub backoff_max: String,

    /// Pause between receives when the queue came back empty.
    #[serde(default = "default_idle_poll_interval")]
    pub idle_poll_interval: String,

    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: String,

    #[serde(default = "default_dispatch_max_attempts")]
    pub dispatch_max_attempts: u32,
}

fn default_worker_pool_size() -> usize {
    8
}

fn default_batch_size() -> usize {
    32
}

fn default_visibility_timeout() -> String {
    "30s".to_string()
}

fn default_max_reconcile_attempts() -> u32 {
    5
}

fn default_max_batch_retries() -> u32 {
    3
}

fn default_backoff_base() -> String {
    "100ms".to_string()
}

fn default_backoff_max() -> String {
    "10s".to_string()
}

fn default_idle_poll_interval() -> String {
    "500ms".to_string()
}

fn default_shutdown_grace() -> String {
    "10s".to_string()
}

fn default_dispatch_max_attempts() -> u32 {
    5
}

impl Default for TrackerSection {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            batch_size: default_batch_size(),
            visibility_timeout: default_visibility_timeout(),
            max_reconcile_attempts: default_max_reconcile_attempts(),
            max_batch_retries: default_max_batch_retries(),
            exhausted_retry_policy: ExhaustedRetryPolicy::default(),
            backoff_base: default_backoff_base(),
            backoff_max: default_backoff_max(),
            idle_poll_interval: default_idle_poll_interval(),
            shutdown_grace: default_shutdown_grace(),
            dispatch_max_attempts: default_dispatch_max_attempts(),
        }
    }
}

/// Validated, immutable process configuration.
///
/// Built once at startup (see [`crate::config::load_and_validate`]) and
/// handed to each component by reference.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Location of the logging configuration file.
    pub logging: PathBuf,
    pub store: BackendUrl,
    pub queue: BackendUrl,
    pub tracker: TrackerSettings,
}

/// Parsed form of [`TrackerSection`].
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub worker_pool_size: usize,
    pub batch_size: usize,
    pub visibility_timeout: Duration,
    pub max_reconcile_attempts: u32,
    pub max_batch_retries: u32,
    pub exhausted_retry_policy: ExhaustedRetryPolicy,
    pub backoff: Backoff,
    pub idle_poll_interval: Duration,
    pub shutdown_grace: Duration,
    pub dispatch_max_attempts: u32,
}

impl TrackerConfig {
    /// Location of the logging configuration file (`[resultstracker].logging`).
    pub fn logging_config_path(&self) -> &std::path::Path {
        &self.logging
    }
}
