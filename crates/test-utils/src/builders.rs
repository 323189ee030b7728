#![allow(dead_code)]

use resultstracker::config::{RawConfigFile, TrackerConfig, TrackerSettings};
use resultstracker::models::{Action, ActionExecution, ExecutionStatus};
use resultstracker::store::MemoryExecutionStore;
use resultstracker::types::ExhaustedRetryPolicy;

/// Builder for `TrackerConfig` with durations short enough for tests.
pub struct TrackerConfigBuilder {
    config: RawConfigFile,
}

impl TrackerConfigBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.resultstracker.logging = "logging.resultstracker.conf".to_string();
        config.tracker.visibility_timeout = "1s".to_string();
        config.tracker.backoff_base = "1ms".to_string();
        config.tracker.backoff_max = "5ms".to_string();
        config.tracker.idle_poll_interval = "10ms".to_string();
        config.tracker.shutdown_grace = "200ms".to_string();
        Self { config }
    }

    pub fn worker_pool_size(mut self, n: usize) -> Self {
        self.config.tracker.worker_pool_size = n;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.tracker.batch_size = n;
        self
    }

    pub fn max_reconcile_attempts(mut self, n: u32) -> Self {
        self.config.tracker.max_reconcile_attempts = n;
        self
    }

    pub fn max_batch_retries(mut self, n: u32) -> Self {
        self.config.tracker.max_batch_retries = n;
        self
    }

    pub fn exhausted_retry_policy(mut self, policy: ExhaustedRetryPolicy) -> Self {
        self.config.tracker.exhausted_retry_policy = policy;
        self
    }

    pub fn visibility_timeout(mut self, value: &str) -> Self {
        self.config.tracker.visibility_timeout = value.to_string();
        self
    }

    pub fn shutdown_grace(mut self, value: &str) -> Self {
        self.config.tracker.shutdown_grace = value.to_string();
        self
    }

    pub fn store(mut self, url: &str) -> Self {
        self.config.database.connection = url.to_string();
        self
    }

    pub fn queue(mut self, url: &str) -> Self {
        self.config.messaging.endpoint = url.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> TrackerConfig {
        TrackerConfig::try_from(self.config).expect("Failed to build valid config from builder")
    }

    pub fn settings(self) -> TrackerSettings {
        self.build().tracker
    }
}

impl Default for TrackerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ActionExecution` records.
pub struct ExecutionBuilder {
    record: ActionExecution,
}

impl ExecutionBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            record: ActionExecution::requested(id, local_action()),
        }
    }

    pub fn status(mut self, status: ExecutionStatus) -> Self {
        self.record.status = status;
        self
    }

    pub fn result(mut self, result: &str) -> Self {
        self.record.result = Some(result.to_string());
        self
    }

    pub fn parameter(mut self, key: &str, value: serde_json::Value) -> Self {
        self.record.action_parameters.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> ActionExecution {
        self.record
    }
}

/// The action most tests run.
pub fn local_action() -> Action {
    Action::new("core.local", "local.py", "run-local")
}

/// Insert a record with `status` into `store`, at revision 0.
pub fn seed(store: &MemoryExecutionStore, id: &str, status: ExecutionStatus) {
    store.insert(ExecutionBuilder::new(id).status(status).build());
}
