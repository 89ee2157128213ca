//! Entry point for callers: summary generation, the CLI, and any UI or API layer.
//!
//! `TaskTracker` composes storage, deduplication, lifecycle and queries behind
//! one set of method names. Apart from stamping new batches it only delegates.

use crate::error::StorageResult;
use crate::export::Snapshot;
use crate::store::TaskStore;
use crate::store::dedup::{comprehensive_summary, generate_task_id, merge_batch};
use crate::store::history::{append_resolution, read_resolutions};
use crate::store::lifecycle::{promote_resolved_team_actions, remove_expired_events};
use crate::types::{
    HistoryResult, SectionMap, Task, TaskStatistics, TaskStatus, now_local, now_timestamp,
};
use chrono::Local;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Default retention for completed tasks, in days.
pub const DEFAULT_COMPLETED_RETENTION_DAYS: i64 = 30;

/// Default window for resolution-history queries, in days.
pub const DEFAULT_HISTORY_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct TaskTracker {
    store: TaskStore,
}

impl TaskTracker {
    pub fn new(store: TaskStore) -> Self {
        Self { store }
    }

    pub fn open<P: AsRef<Path>>(dir: P) -> Self {
        Self::new(TaskStore::open(dir))
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Stamp every task in `batch` and merge it into outstanding storage.
    ///
    /// Tasks keep a caller-supplied `task_id`; others get one generated from
    /// their content. Returns false if the result could not be written.
    pub fn save_outstanding_tasks(&self, batch: SectionMap, timestamp: Option<&str>) -> bool {
        let timestamp = timestamp.map(str::to_string).unwrap_or_else(now_timestamp);

        let mut stamped = SectionMap::new();
        for (section, tasks) in batch.into_sections() {
            for mut task in tasks {
                stamp_new_task(&mut task, &timestamp);
                task.section = Some(section);
                stamped.push(section, task);
            }
        }
        let incoming = stamped.total();

        let existing = self.store.load_outstanding();
        let merged = merge_batch(existing, stamped, &timestamp);
        info!(incoming, outstanding = merged.total(), "Saving batch");
        self.store.save_outstanding(&merged, &timestamp)
    }

    /// Outstanding tasks, optionally cleaned of expired events and of team
    /// actions flagged as resolved. The cleaned set is persisted if it changed.
    pub fn load_outstanding_tasks(&self, auto_clean_expired: bool) -> SectionMap {
        let mut tasks = self.store.load_outstanding();
        if !auto_clean_expired {
            return tasks;
        }

        let expired = remove_expired_events(&mut tasks, Local::now().date_naive());
        let promoted = promote_resolved_team_actions(&mut tasks, Task::is_externally_resolved);
        if expired + promoted > 0 {
            info!(expired, promoted, "Cleaned outstanding tasks");
            self.store.save_outstanding(&tasks, &now_timestamp());
        }
        tasks
    }

    /// The current batch combined with everything still outstanding.
    pub fn get_comprehensive_summary(&self, current_batch: &SectionMap) -> SectionMap {
        let outstanding = self.load_outstanding_tasks(true);
        comprehensive_summary(current_batch, &outstanding)
    }

    pub fn mark_tasks_completed(&self, task_ids: &[String], timestamp: Option<&str>) -> usize {
        self.store.mark_completed(task_ids, timestamp)
    }

    pub fn get_entry_ids_for_tasks(&self, task_ids: &[String]) -> Vec<String> {
        self.store.entry_ids_for_tasks(task_ids)
    }

    pub fn load_completed_tasks(&self) -> Vec<Task> {
        self.store.load_completed()
    }

    pub fn get_task_statistics(&self) -> TaskStatistics {
        self.store.task_statistics()
    }

    pub fn cleanup_old_completed_tasks(&self, days_to_keep: i64) -> usize {
        self.store.cleanup_old_completed(days_to_keep)
    }

    pub fn clear_fyi_items(&self) -> usize {
        self.store.clear_fyi_items()
    }

    pub fn clear_newsletter_items(&self) -> usize {
        self.store.clear_newsletter_items()
    }

    pub fn clear_optional_events(&self) -> usize {
        self.store.clear_optional_events()
    }

    pub fn clear_both_fyi_and_newsletters(&self) -> (usize, usize) {
        self.store.clear_both_fyi_and_newsletters()
    }

    pub fn record_task_resolution(
        &self,
        task_id: &str,
        resolution_type: &str,
        notes: Option<&str>,
        timestamp: Option<&str>,
    ) -> bool {
        self.store
            .record_resolution(task_id, resolution_type, notes.unwrap_or_default(), timestamp)
    }

    pub fn get_resolution_history(
        &self,
        days_back: i64,
        resolution_type: Option<&str>,
        include_stats: bool,
    ) -> HistoryResult {
        self.store
            .resolution_history(days_back, resolution_type, include_stats)
    }

    /// Everything in the store as one document.
    pub fn export_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.outstanding = self.store.load_outstanding();
        snapshot.completed = self.store.load_completed();
        snapshot.resolutions = read_resolutions(&self.store.history_dir()).unwrap_or_else(|e| {
            warn!(error = %e, "Could not read resolution history for export");
            Vec::new()
        });
        snapshot
    }

    /// Restore a snapshot: its outstanding and completed tasks replace the
    /// stored ones, and its resolution records are appended unless a record
    /// with the same task id and timestamp is already in the history.
    ///
    /// Returns the number of history records added.
    pub fn import_snapshot(&self, snapshot: &Snapshot) -> StorageResult<usize> {
        let history_dir = self.store.history_dir();
        let mut known: HashSet<(String, String)> = read_resolutions(&history_dir)?
            .into_iter()
            .map(|r| (r.task_id, r.resolution_timestamp))
            .collect();

        self.store.write_completed(&snapshot.completed)?;
        self.store
            .write_outstanding(&snapshot.outstanding, &now_timestamp())?;

        let now = now_local();
        let mut added = 0;
        for record in &snapshot.resolutions {
            let key = (record.task_id.clone(), record.resolution_timestamp.clone());
            if known.insert(key) {
                append_resolution(&history_dir, record, now)?;
                added += 1;
            }
        }

        let (outstanding, completed, resolutions) = snapshot.counts();
        info!(outstanding, completed, resolutions, added, "Snapshot imported");
        Ok(added)
    }
}

/// Give a batch task its identity and first-persistence fields.
fn stamp_new_task(task: &mut Task, timestamp: &str) {
    if task.task_id.as_deref().is_none_or(str::is_empty) {
        task.task_id = Some(generate_task_id(task));
    }
    task.normalize_entry_ids();
    task.status = TaskStatus::Outstanding;
    task.first_seen = Some(timestamp.to_string());
    task.batch_timestamp = Some(timestamp.to_string());
    task.batch_count = 1;
    task.completion_timestamp = None;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Section;
    use tempfile::TempDir;

    #[test]
    fn test_stamp_new_task_assigns_identity() {
        let mut task = Task::new("Review PR", "a@co.com").with_entry_id("E1");
        task.batch_count = 7;
        stamp_new_task(&mut task, "2025-01-01 08:00:00");

        assert_eq!(task.task_id, Some(generate_task_id(&Task::new("Review PR", "a@co.com"))));
        assert_eq!(task.first_seen.as_deref(), Some("2025-01-01 08:00:00"));
        assert_eq!(task.batch_count, 1);
        assert!(task.entry_ids.contains("E1"));
    }

    #[test]
    fn test_stamp_keeps_caller_task_id() {
        let mut task = Task::new("Review PR", "a@co.com");
        task.task_id = Some("custom".into());
        stamp_new_task(&mut task, "2025-01-01 08:00:00");
        assert_eq!(task.task_id.as_deref(), Some("custom"));
    }

    #[test]
    fn test_save_records_section_on_task() {
        let dir = TempDir::new().unwrap();
        let tracker = TaskTracker::open(dir.path());

        let mut batch = SectionMap::new();
        batch.push(Section::JobListings, Task::new("Rust dev", "jobs@co.com"));
        assert!(tracker.save_outstanding_tasks(batch, None));

        let loaded = tracker.load_outstanding_tasks(false);
        assert_eq!(
            loaded.get(Section::JobListings)[0].section,
            Some(Section::JobListings)
        );
    }

    #[test]
    fn test_export_snapshot_collects_all_documents() {
        let dir = TempDir::new().unwrap();
        let tracker = TaskTracker::open(dir.path());

        let mut batch = SectionMap::new();
        batch.push(Section::RequiredActions, Task::new("One", "a"));
        batch.push(Section::RequiredActions, Task::new("Two", "a"));
        tracker.save_outstanding_tasks(batch, None);
        let id = tracker.load_outstanding_tasks(false).get(Section::RequiredActions)[0]
            .task_id
            .clone()
            .unwrap();
        assert!(tracker.record_task_resolution(&id, "completed", None, None));

        let snapshot = tracker.export_snapshot();
        assert_eq!(snapshot.outstanding.total(), 1);
        assert_eq!(snapshot.completed.len(), 1);
        assert_eq!(snapshot.resolutions.len(), 1);
        assert_eq!(snapshot.resolutions[0].task_id, id);
    }

    #[test]
    fn test_import_snapshot_restores_store_without_duplicating_history() {
        let source_dir = TempDir::new().unwrap();
        let source = TaskTracker::open(source_dir.path());
        let mut batch = SectionMap::new();
        batch.push(Section::RequiredActions, Task::new("One", "a"));
        batch.push(Section::TeamActions, Task::new("Two", "a"));
        source.save_outstanding_tasks(batch, None);
        let id = source.load_outstanding_tasks(false).get(Section::RequiredActions)[0]
            .task_id
            .clone()
            .unwrap();
        source.record_task_resolution(&id, "dismissed", Some("spam"), None);

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.json.gz");
        source.export_snapshot().write_to(&path, true).unwrap();

        let target_dir = TempDir::new().unwrap();
        let target = TaskTracker::open(target_dir.path());
        target.save_outstanding_tasks(
            {
                let mut stale = SectionMap::new();
                stale.push(Section::FyiNotices, Task::new("Replaced", "z"));
                stale
            },
            None,
        );

        let snapshot = Snapshot::from_file(&path).unwrap();
        assert_eq!(target.import_snapshot(&snapshot).unwrap(), 1);
        assert_eq!(target.import_snapshot(&snapshot).unwrap(), 0);

        let outstanding = target.load_outstanding_tasks(false);
        assert_eq!(outstanding.total(), 1);
        assert!(outstanding.get(Section::FyiNotices).is_empty());
        assert_eq!(target.load_completed_tasks().len(), 1);

        let history = target.get_resolution_history(1, None, false);
        assert_eq!(history.records.len(), 1);
        assert_eq!(history.records[0].resolution_notes, "spam");
    }
}
