use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::Deserialize;

/// Boxed, `Send` future returned by the pluggable backend traits (store,
/// queue, notifier) so they stay object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What happens to a message that is still failing with a retryable error
/// after the supervisor has used up its in-batch retry rounds.
///
/// - `DeadLetter`: move it to the dead-letter queue with the last error as the
///   reason (default behaviour).
/// - `Redeliver`: leave it unacknowledged so the queue hands it out again after
///   the visibility timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum ExhaustedRetryPolicy {
    DeadLetter,
    Redeliver,
}

impl Default for ExhaustedRetryPolicy {
    fn default() -> Self {
        ExhaustedRetryPolicy::DeadLetter
    }
}

impl FromStr for ExhaustedRetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dead_letter" | "dead-letter" => Ok(ExhaustedRetryPolicy::DeadLetter),
            "redeliver" => Ok(ExhaustedRetryPolicy::Redeliver),
            other => Err(format!(
                "invalid exhausted_retry_policy: {other} (expected \"dead_letter\" or \"redeliver\")"
            )),
        }
    }
}

impl TryFrom<String> for ExhaustedRetryPolicy {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Backend selected by a `scheme://` connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendUrl {
    /// In-process, non-durable backend.
    Memory,
    /// Directory-backed backend rooted at the given path.
    File(std::path::PathBuf),
}

impl FromStr for BackendUrl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "memory://" || s == "memory" {
            return Ok(BackendUrl::Memory);
        }
        match s.strip_prefix("file://") {
            Some(path) if !path.is_empty() => Ok(BackendUrl::File(path.into())),
            Some(_) => Err("file:// url needs a directory path".to_string()),
            None => Err(format!(
                "unsupported backend url: {s} (expected memory:// or file://<dir>)"
            )),
        }
    }
}
