// src/queue/file.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::{Result, TrackerError};
use crate::fs::FileSystem;
use crate::types::BoxFuture;

use super::{Delivery, StatusMessage, StatusQueue};

const INCOMING: &str = "incoming";
const DEAD_LETTER: &str = "dead-letter";

#[derive(Debug)]
struct Claim {
    receipt: String,
    attempt: u32,
    visible_at: Instant,
}

/// Spool-directory queue.
///
/// Publishers drop one JSON [`StatusMessage`] per file into
/// `<dir>/incoming/`. Claims and delivery counts are kept in memory, so a
/// restarted tracker sees every unacknowledged file again. Acking deletes the
/// file; dead-lettering moves it to `<dir>/dead-letter/` next to a `.reason`
/// file.
#[derive(Debug)]
pub struct FileStatusQueue {
    fs: Arc<dyn FileSystem>,
    incoming: PathBuf,
    dead_letter: PathBuf,
    claims: Mutex<HashMap<PathBuf, Claim>>,
}

impl FileStatusQueue {
    pub fn open(fs: Arc<dyn FileSystem>, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let incoming = dir.join(INCOMING);
        let dead_letter = dir.join(DEAD_LETTER);
        fs.create_dir_all(&incoming).map_err(unavailable)?;
        fs.create_dir_all(&dead_letter).map_err(unavailable)?;
        Ok(Self {
            fs,
            incoming,
            dead_letter,
            claims: Mutex::new(HashMap::new()),
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Claim>> {
        self.claims.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn receive_now(&self, max: usize, visibility_timeout: Duration) -> Result<Vec<Delivery>> {
        let now = Instant::now();
        let files = self.fs.read_dir(&self.incoming).map_err(unavailable)?;

        let mut batch = Vec::new();
        for path in files {
            if batch.len() >= max {
                break;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let previous = match self.lock().get(&path) {
                Some(claim) if claim.visible_at > now => continue,
                Some(claim) => claim.attempt,
                None => 0,
            };

            let body = self.fs.read_to_string(&path).map_err(unavailable)?;
            let mut message: StatusMessage = match serde_json::from_str(&body) {
                Ok(m) => m,
                Err(err) => {
                    warn!(file = ?path, error = %err, "malformed status message; dead-lettering");
                    self.move_to_dead_letter(&path, &format!("malformed message: {err}"))?;
                    continue;
                }
            };

            if message.message_id.is_empty() {
                message.message_id = spool_message_id(&path);
            }

            let attempt = previous + 1;
            let receipt = format!("{}#{}", path.display(), attempt);
            self.lock().insert(
                path.clone(),
                Claim {
                    receipt: receipt.clone(),
                    attempt,
                    visible_at: now + visibility_timeout,
                },
            );
            batch.push(Delivery {
                message,
                receipt,
                attempt,
            });
        }
        Ok(batch)
    }

    /// Release the claim behind `delivery` and return its file, if the
    /// delivery is still the current one.
    fn settle(&self, delivery: &Delivery) -> Option<PathBuf> {
        let mut claims = self.lock();
        let path = claims
            .iter()
            .find(|(_, c)| c.receipt == delivery.receipt)
            .map(|(p, _)| p.clone());
        match path {
            Some(p) => {
                claims.remove(&p);
                Some(p)
            }
            None => {
                debug!(receipt = %delivery.receipt, "settling a delivery that is no longer current; ignoring");
                None
            }
        }
    }

    fn move_to_dead_letter(&self, path: &Path, reason: &str) -> Result<()> {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return Ok(());
        };
        let target = self.free_dead_letter_slot(stem);
        self.fs.rename(path, &target).map_err(unavailable)?;
        let reason_file = target.with_extension("reason");
        self.fs
            .write_atomic(&reason_file, reason.as_bytes())
            .map_err(unavailable)
    }

    /// First `<stem>[-N].json` in the dead-letter directory whose message
    /// and reason files are both absent.
    fn free_dead_letter_slot(&self, stem: &str) -> PathBuf {
        let taken = |p: &Path| self.fs.exists(p) || self.fs.exists(&p.with_extension("reason"));
        let first = self.dead_letter.join(format!("{stem}.json"));
        if !taken(first.as_path()) {
            return first;
        }
        (1u32..)
            .map(|n| self.dead_letter.join(format!("{stem}-{n}.json")))
            .find(|p| !taken(p.as_path()))
            .unwrap_or(first)
    }
}

/// Id for messages published without one. Derived from the spool file, so
/// every redelivery of the same file carries the same id.
fn spool_message_id(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    format!("spool:{name}")
}

fn unavailable(err: anyhow::Error) -> TrackerError {
    TrackerError::QueueUnavailable(format!("{err:#}"))
}

impl StatusQueue for FileStatusQueue {
    fn receive_batch(
        &self,
        max: usize,
        visibility_timeout: Duration,
    ) -> BoxFuture<'_, Result<Vec<Delivery>>> {
        Box::pin(async move { self.receive_now(max, visibility_timeout) })
    }

    fn ack<'a>(&'a self, delivery: &'a Delivery) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self.settle(delivery) {
                Some(path) => self.fs.remove_file(&path).map_err(unavailable),
                None => Ok(()),
            }
        })
    }

    fn nack_to_dead_letter<'a>(
        &'a self,
        delivery: &'a Delivery,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self.settle(delivery) {
                Some(path) => self.move_to_dead_letter(&path, reason),
                None => Ok(()),
            }
        })
    }
}
