//! Storage layer: the outstanding-task and completed-task JSON documents.
//!
//! The `read_*`/`write_*` functions report failures as [`StorageError`].
//! The `load_*`/`save_*` wrappers fall back to empty data and log instead,
//! which is what every caller above this layer wants.

pub mod dedup;
pub mod history;
pub mod lifecycle;
pub mod queries;

use crate::error::{StorageError, StorageResult};
use crate::types::{SectionMap, Task};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const OUTSTANDING_FILE: &str = "outstanding_tasks.json";
pub const COMPLETED_FILE: &str = "completed_tasks.json";
pub const HISTORY_DIR: &str = "task_history";

/// On-disk shape of the outstanding-task document.
#[derive(Debug, Deserialize)]
struct OutstandingDocument {
    #[serde(default)]
    tasks: SectionMap,
}

#[derive(Serialize)]
struct OutstandingDocumentRef<'a> {
    last_updated: &'a str,
    tasks: &'a SectionMap,
}

/// Handle on a storage directory.
#[derive(Debug, Clone)]
pub struct TaskStore {
    dir: PathBuf,
}

impl TaskStore {
    /// Use `dir` as the storage directory. Nothing is created until the first write.
    pub fn open<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn outstanding_path(&self) -> PathBuf {
        self.dir.join(OUTSTANDING_FILE)
    }

    pub fn completed_path(&self) -> PathBuf {
        self.dir.join(COMPLETED_FILE)
    }

    pub fn history_dir(&self) -> PathBuf {
        self.dir.join(HISTORY_DIR)
    }

    /// Read the outstanding tasks. A missing file is an empty store.
    ///
    /// Stored tasks without a `task_id` cannot be merged or completed and are dropped.
    pub fn read_outstanding(&self) -> StorageResult<SectionMap> {
        let path = self.outstanding_path();
        let Some(bytes) = read_if_exists(&path)? else {
            return Ok(SectionMap::new());
        };
        let document: OutstandingDocument =
            serde_json::from_slice(&bytes).map_err(|e| StorageError::json(&path, e))?;

        let mut tasks = document.tasks;
        for (section, entries) in tasks.iter_mut() {
            let before = entries.len();
            entries.retain(|task| task.task_id.is_some());
            let dropped = before - entries.len();
            if dropped > 0 {
                warn!(section = %section, dropped, "Skipping stored tasks without task_id");
            }
        }
        Ok(tasks)
    }

    /// Write the outstanding tasks, replacing the previous document atomically.
    pub fn write_outstanding(&self, tasks: &SectionMap, timestamp: &str) -> StorageResult<()> {
        let document = OutstandingDocumentRef {
            last_updated: timestamp,
            tasks,
        };
        write_json_atomic(&self.outstanding_path(), &document)
    }

    /// Read the completed tasks. A missing file is an empty list.
    pub fn read_completed(&self) -> StorageResult<Vec<Task>> {
        let path = self.completed_path();
        let Some(bytes) = read_if_exists(&path)? else {
            return Ok(Vec::new());
        };
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| StorageError::json(&path, e))?;
        let Value::Array(entries) = value else {
            return Err(StorageError::shape(&path, "expected a list of tasks"));
        };

        let mut tasks = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<Task>(entry) {
                Ok(task) => tasks.push(task),
                Err(e) => warn!(index, error = %e, "Skipping malformed completed task"),
            }
        }
        Ok(tasks)
    }

    pub fn write_completed(&self, tasks: &[Task]) -> StorageResult<()> {
        write_json_atomic(&self.completed_path(), &tasks)
    }

    /// Outstanding tasks, or an empty map if the document cannot be read.
    pub fn load_outstanding(&self) -> SectionMap {
        self.read_outstanding().unwrap_or_else(|e| {
            warn!(error = %e, "Could not load outstanding tasks; starting empty");
            SectionMap::new()
        })
    }

    /// Persist outstanding tasks. Returns false (after logging) on failure.
    pub fn save_outstanding(&self, tasks: &SectionMap, timestamp: &str) -> bool {
        match self.write_outstanding(tasks, timestamp) {
            Ok(()) => {
                debug!(total = tasks.total(), "Saved outstanding tasks");
                true
            }
            Err(e) => {
                warn!(error = %e, "Could not save outstanding tasks");
                false
            }
        }
    }

    /// Completed tasks, or an empty list if the document cannot be read.
    pub fn load_completed(&self) -> Vec<Task> {
        self.read_completed().unwrap_or_else(|e| {
            warn!(error = %e, "Could not load completed tasks; starting empty");
            Vec::new()
        })
    }

    /// Persist completed tasks. Returns false (after logging) on failure.
    pub fn save_completed(&self, tasks: &[Task]) -> bool {
        match self.write_completed(tasks) {
            Ok(()) => {
                debug!(total = tasks.len(), "Saved completed tasks");
                true
            }
            Err(e) => {
                warn!(error = %e, "Could not save completed tasks");
                false
            }
        }
    }
}

fn read_if_exists(path: &Path) -> StorageResult<Option<Vec<u8>>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

/// Serialize `value` into a temp file beside `path`, then rename it over `path`.
/// The target is either fully replaced or left untouched.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StorageResult<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;

    let json = serde_json::to_vec_pretty(value).map_err(|e| StorageError::json(path, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StorageError::io(dir, e))?;
    tmp.write_all(&json).map_err(|e| StorageError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| StorageError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| StorageError::io(path, e.error))?;
    Ok(())
}
