// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{RawConfigFile, TrackerConfig, TrackerSection, TrackerSettings};
use crate::engine::backoff::Backoff;
use crate::errors::{Result, TrackerError};
use crate::types::BackendUrl;

impl TryFrom<RawConfigFile> for TrackerConfig {
    type Error = crate::errors::TrackerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;

        let store = parse_backend("[database].connection", &raw.database.connection)?;
        let queue = parse_backend("[messaging].endpoint", &raw.messaging.endpoint)?;
        let tracker = parse_tracker_section(&raw.tracker)?;

        Ok(TrackerConfig {
            logging: raw.resultstracker.logging.into(),
            store,
            queue,
            tracker,
        })
    }
}

/// Check the invariants that do not need parsing.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_logging_path(cfg)?;
    validate_tracker_counts(&cfg.tracker)?;
    Ok(())
}

fn validate_logging_path(cfg: &RawConfigFile) -> Result<()> {
    if cfg.resultstracker.logging.trim().is_empty() {
        return Err(TrackerError::ConfigError(
            "[resultstracker].logging must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_tracker_counts(tracker: &TrackerSection) -> Result<()> {
    let counts = [
        ("worker_pool_size", tracker.worker_pool_size as u64),
        ("batch_size", tracker.batch_size as u64),
        ("max_reconcile_attempts", u64::from(tracker.max_reconcile_attempts)),
        ("dispatch_max_attempts", u64::from(tracker.dispatch_max_attempts)),
    ];

    for (name, value) in counts {
        if value == 0 {
            return Err(TrackerError::ConfigError(format!(
                "[tracker].{name} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

fn parse_backend(field: &str, url: &str) -> Result<BackendUrl> {
    url.parse()
        .map_err(|e| TrackerError::ConfigError(format!("{field}: {e}")))
}

fn parse_tracker_section(section: &TrackerSection) -> Result<TrackerSettings> {
    let backoff_base = parse_field("backoff_base", &section.backoff_base)?;
    let backoff_max = parse_field("backoff_max", &section.backoff_max)?;
    if backoff_base > backoff_max {
        return Err(TrackerError::ConfigError(format!(
            "[tracker].backoff_base ({}) must not exceed backoff_max ({})",
            section.backoff_base, section.backoff_max
        )));
    }

    let visibility_timeout = parse_field("visibility_timeout", &section.visibility_timeout)?;
    if visibility_timeout.is_zero() {
        return Err(TrackerError::ConfigError(
            "[tracker].visibility_timeout must be greater than zero".to_string(),
        ));
    }

    Ok(TrackerSettings {
        worker_pool_size: section.worker_pool_size,
        batch_size: section.batch_size,
        visibility_timeout,
        max_reconcile_attempts: section.max_reconcile_attempts,
        max_batch_retries: section.max_batch_retries,
        exhausted_retry_policy: section.exhausted_retry_policy,
        backoff: Backoff::new(backoff_base, backoff_max),
        idle_poll_interval: parse_field("idle_poll_interval", &section.idle_poll_interval)?,
        shutdown_grace: parse_field("shutdown_grace", &section.shutdown_grace)?,
        dispatch_max_attempts: section.dispatch_max_attempts,
    })
}

fn parse_field(name: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .ok_or_else(|| TrackerError::ConfigError(format!("[tracker].{name}: invalid duration '{value}'")))
}

/// Parse `"250ms"`, `"30s"`, `"5m"` or `"1h"`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = s.split_at(split);
    let n: u64 = digits.parse().ok()?;

    match unit.trim() {
        "ms" => Some(Duration::from_millis(n)),
        "s" => Some(Duration::from_secs(n)),
        "m" => Some(Duration::from_secs(n.checked_mul(60)?)),
        "h" => Some(Duration::from_secs(n.checked_mul(3600)?)),
        _ => None,
    }
}
