//! Time-based transitions: event expiry, completion, pruning and resolution records.

use super::TaskStore;
use super::history::append_resolution;
use crate::types::{
    ResolutionRecord, Section, SectionMap, Task, TaskStatus, days_before, format_timestamp,
    now_local, parse_timestamp,
};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Date formats accepted for an event's `date` field, tried in order.
const EVENT_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

pub fn parse_event_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    EVENT_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
}

/// Whether an event's date is strictly before `today`.
///
/// Missing or unparseable dates never expire.
pub fn is_event_expired_on(event: &Task, today: NaiveDate) -> bool {
    let Some(raw) = event.date.as_deref().filter(|d| !d.trim().is_empty()) else {
        return false;
    };
    match parse_event_date(raw) {
        Some(date) => date < today,
        None => {
            debug!(date = %raw, subject = %event.subject, "Unrecognized event date; keeping event");
            false
        }
    }
}

pub fn is_event_expired(event: &Task) -> bool {
    is_event_expired_on(event, Local::now().date_naive())
}

/// Drop optional events dated before `today`. Returns how many were removed.
pub fn remove_expired_events(tasks: &mut SectionMap, today: NaiveDate) -> usize {
    let events = tasks.get_mut(Section::OptionalEvents);
    let before = events.len();
    events.retain(|event| {
        let expired = is_event_expired_on(event, today);
        if expired {
            info!(subject = %event.subject, date = ?event.date, "Removing expired event");
        }
        !expired
    });
    before - events.len()
}

/// Move team actions for which `is_resolved` holds into `completed_team_actions`.
///
/// The tasks stay outstanding; only their section changes. A task whose id is
/// already in `completed_team_actions` is folded into that entry the way a
/// recurring batch task is. Returns how many left `team_actions`.
pub fn promote_resolved_team_actions<F>(tasks: &mut SectionMap, is_resolved: F) -> usize
where
    F: Fn(&Task) -> bool,
{
    let (resolved, pending): (Vec<Task>, Vec<Task>) = tasks
        .get_mut(Section::TeamActions)
        .drain(..)
        .partition(|task| is_resolved(task));
    *tasks.get_mut(Section::TeamActions) = pending;

    let moved = resolved.len();
    let done = tasks.get_mut(Section::CompletedTeamActions);
    for mut task in resolved {
        task.normalize_entry_ids();
        let existing = task
            .task_id
            .as_deref()
            .and_then(|id| done.iter_mut().find(|t| t.has_id(id)));
        match existing {
            Some(current) => {
                current.batch_count += 1;
                if task.batch_timestamp.is_some() {
                    current.batch_timestamp = task.batch_timestamp;
                }
                current.entry_ids.extend(task.entry_ids);
                debug!(task_id = ?current.task_id, batch_count = current.batch_count, "Merged resolved team action");
            }
            None => {
                info!(task_id = ?task.task_id, subject = %task.subject, "Team action resolved elsewhere");
                task.section = Some(Section::CompletedTeamActions);
                done.push(task);
            }
        }
    }
    moved
}

/// Whole days since `first_seen`, as of `now`.
///
/// Anything seen earlier than `now` is at least one day old. A missing or
/// unparseable `first_seen` gives 0.
pub fn calculate_task_age_at(task: &Task, now: NaiveDateTime) -> i64 {
    let Some(first_seen) = task.first_seen.as_deref().and_then(parse_timestamp) else {
        return 0;
    };
    let elapsed = now - first_seen;
    let days = elapsed.num_days();
    if days == 0 && elapsed > Duration::zero() {
        1
    } else {
        days.max(0)
    }
}

pub fn calculate_task_age(task: &Task) -> i64 {
    calculate_task_age_at(task, now_local())
}

impl TaskStore {
    /// Move the given tasks from outstanding to completed storage.
    ///
    /// Files are written only if at least one task matched. Completed storage
    /// is written first, so a failed write can leave a task in both documents
    /// but never in neither. Returns the number moved, or 0 if a write failed.
    pub fn mark_completed(&self, task_ids: &[String], completion_timestamp: Option<&str>) -> usize {
        let wanted: HashSet<&str> = task_ids.iter().map(String::as_str).collect();
        if wanted.is_empty() {
            return 0;
        }

        let mut outstanding = self.load_outstanding();
        let stamp = completion_timestamp
            .map(str::to_string)
            .unwrap_or_else(|| format_timestamp(now_local()));

        let mut finished = Vec::new();
        for (section, tasks) in outstanding.iter_mut() {
            let (done, keep): (Vec<Task>, Vec<Task>) = tasks
                .drain(..)
                .partition(|task| task.id().is_some_and(|id| wanted.contains(id)));
            *tasks = keep;
            for mut task in done {
                task.status = TaskStatus::Completed;
                task.completion_timestamp = Some(stamp.clone());
                task.section.get_or_insert(section);
                info!(task_id = ?task.task_id, section = %section, "Task completed");
                finished.push(task);
            }
        }

        if finished.is_empty() {
            debug!(requested = wanted.len(), "No outstanding tasks matched; nothing to complete");
            return 0;
        }

        let moved = finished.len();
        let mut completed = self.load_completed();
        completed.extend(finished);
        if !self.save_completed(&completed) {
            warn!(moved, "Completion not applied: completed tasks could not be written");
            return 0;
        }
        if !self.save_outstanding(&outstanding, &format_timestamp(now_local())) {
            warn!(moved, "Completed tasks written but outstanding tasks could not be updated");
            return 0;
        }
        moved
    }

    /// Drop completed tasks finished more than `days_to_keep` days ago.
    ///
    /// Tasks without a readable completion timestamp are kept. Returns the number removed.
    pub fn cleanup_old_completed(&self, days_to_keep: i64) -> usize {
        let Some(cutoff) = days_before(now_local(), days_to_keep) else {
            debug!(days_to_keep, "Retention window reaches past the earliest date; keeping everything");
            return 0;
        };
        let mut completed = self.load_completed();
        let before = completed.len();

        completed.retain(|task| {
            match task.completion_timestamp.as_deref().and_then(parse_timestamp) {
                Some(done_at) => done_at >= cutoff,
                None => true,
            }
        });

        let removed = before - completed.len();
        if removed > 0 {
            info!(removed, days_to_keep, "Pruned old completed tasks");
            self.save_completed(&completed);
        }
        removed
    }

    /// Record why a task left the outstanding set, then complete it.
    ///
    /// The history line is written before the task is moved, so a crash in
    /// between leaves a recorded-but-outstanding task, never the reverse.
    /// Returns false if the task is unknown, the history write fails, or the
    /// task could not be moved to completed storage.
    pub fn record_resolution(
        &self,
        task_id: &str,
        resolution_type: &str,
        notes: &str,
        completion_timestamp: Option<&str>,
    ) -> bool {
        let outstanding = self.load_outstanding();
        let Some((section, task)) = outstanding.find(task_id) else {
            warn!(task_id = %task_id, "Cannot record resolution: task not found");
            return false;
        };

        let now = now_local();
        let resolved_at = completion_timestamp
            .map(str::to_string)
            .unwrap_or_else(|| format_timestamp(now));
        let record = ResolutionRecord {
            task_id: task_id.to_string(),
            resolution_timestamp: resolved_at.clone(),
            resolution_type: resolution_type.to_string(),
            resolution_notes: notes.to_string(),
            task_section: section.as_str().to_string(),
            task_data: task.clone(),
            task_age_days: calculate_task_age_at(task, now),
            associated_emails: task.entry_ids.iter().cloned().collect(),
            task_priority: task.priority.clone(),
            task_sender: task.sender.clone(),
        };

        if let Err(e) = append_resolution(&self.history_dir(), &record, now) {
            warn!(task_id = %task_id, error = %e, "Could not write resolution record");
            return false;
        }
        info!(task_id = %task_id, resolution_type = %resolution_type, "Recorded task resolution");

        if self.mark_completed(&[task_id.to_string()], Some(&resolved_at)) == 0 {
            warn!(task_id = %task_id, "Resolution recorded but the task could not be completed");
            return false;
        }
        true
    }
}
