// src/store/file.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::errors::{Result, TrackerError};
use crate::fs::FileSystem;
use crate::models::{ActionExecution, ExecutionUpdate, Revision, Versioned};
use crate::types::BoxFuture;

use super::{ExecutionStore, UpdateResult};

/// Directory-backed store: `<dir>/<execution id>.json` holds a
/// `Versioned<ActionExecution>` document.
///
/// Conditional updates are serialised by an in-process lock and land through
/// an atomic file replace, so a reader never sees a half-written record. The
/// directory must be owned by a single tracker process.
#[derive(Debug)]
pub struct FileExecutionStore {
    fs: Arc<dyn FileSystem>,
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileExecutionStore {
    pub fn open(fs: Arc<dyn FileSystem>, dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs.create_dir_all(&dir).map_err(unavailable)?;
        Ok(Self {
            fs,
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Write a record at revision 0, as the upstream scheduler would.
    pub fn insert(&self, record: &ActionExecution) -> Result<()> {
        let path = self.path_for(&record.id).ok_or_else(|| {
            TrackerError::ConfigError(format!("execution id '{}' is not storable", record.id))
        })?;
        let doc = Versioned {
            record: record.clone(),
            revision: 0,
        };
        let body = serde_json::to_vec_pretty(&doc)?;
        self.fs.write_atomic(&path, &body).map_err(unavailable)
    }

    /// `None` for ids that would escape the directory.
    fn path_for(&self, id: &str) -> Option<PathBuf> {
        let storable = !id.is_empty()
            && !id.starts_with('.')
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        storable.then(|| self.dir.join(format!("{id}.json")))
    }

    fn read(&self, id: &str) -> Result<Option<Versioned<ActionExecution>>> {
        let Some(path) = self.path_for(id) else {
            debug!(execution_id = %id, "execution id is not storable; treating as absent");
            return Ok(None);
        };
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        let body = self.fs.read_to_string(&path).map_err(unavailable)?;
        let doc = serde_json::from_str(&body)?;
        Ok(Some(doc))
    }
}

fn unavailable(err: anyhow::Error) -> TrackerError {
    TrackerError::StoreUnavailable(format!("{err:#}"))
}

impl ExecutionStore for FileExecutionStore {
    fn get<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Option<Versioned<ActionExecution>>>> {
        Box::pin(async move { self.read(id) })
    }

    fn compare_and_update<'a>(
        &'a self,
        id: &'a str,
        expected: Revision,
        update: ExecutionUpdate,
    ) -> BoxFuture<'a, Result<UpdateResult>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;

            let Some(mut doc) = self.read(id)? else {
                return Ok(UpdateResult::NotFound);
            };
            if doc.revision != expected {
                return Ok(UpdateResult::Conflict {
                    current: doc.revision,
                });
            }

            update.apply_to(&mut doc.record);
            doc.revision += 1;

            // path_for succeeded inside read()
            let path = self.dir.join(format!("{id}.json"));
            let body = serde_json::to_vec_pretty(&doc)?;
            self.fs.write_atomic(&path, &body).map_err(unavailable)?;

            Ok(UpdateResult::Updated(doc.revision))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::models::{Action, ExecutionStatus};
    use chrono::Utc;

    fn store(fs: &MockFileSystem) -> FileExecutionStore {
        FileExecutionStore::open(Arc::new(fs.clone()), "/var/lib/executions").unwrap()
    }

    #[tokio::test]
    async fn round_trips_through_documents() {
        let fs = MockFileSystem::new();
        let store = store(&fs);
        store
            .insert(&ActionExecution::requested(
                "E1",
                Action::new("core.local", "local.py", "run-local"),
            ))
            .unwrap();

        let update = ExecutionUpdate {
            status: ExecutionStatus::Succeeded,
            result: Some("ok".into()),
            end_timestamp: Some(Utc::now()),
        };
        assert_eq!(
            store.compare_and_update("E1", 0, update.clone()).await.unwrap(),
            UpdateResult::Updated(1)
        );
        assert_eq!(
            store.compare_and_update("E1", 0, update).await.unwrap(),
            UpdateResult::Conflict { current: 1 }
        );

        let doc = store.get("E1").await.unwrap().unwrap();
        assert_eq!(doc.revision, 1);
        assert_eq!(doc.record.status, ExecutionStatus::Succeeded);
        assert_eq!(doc.record.result.as_deref(), Some("ok"));
        assert_eq!(fs.files(), vec![PathBuf::from("/var/lib/executions/E1.json")]);
    }

    #[tokio::test]
    async fn hostile_ids_are_absent() {
        let fs = MockFileSystem::new();
        let store = store(&fs);
        assert!(store.get("../etc/passwd").await.unwrap().is_none());
        assert!(store.get("").await.unwrap().is_none());
        assert_eq!(
            store
                .compare_and_update(
                    "a/b",
                    0,
                    ExecutionUpdate {
                        status: ExecutionStatus::Running,
                        result: None,
                        end_timestamp: None,
                    }
                )
                .await
                .unwrap(),
            UpdateResult::NotFound
        );
    }

    #[tokio::test]
    async fn corrupt_document_is_an_error() {
        let fs = MockFileSystem::new();
        let store = store(&fs);
        fs.add_file("/var/lib/executions/E1.json", "{not json");
        assert!(matches!(
            store.get("E1").await,
            Err(TrackerError::JsonError(_))
        ));
    }
}
