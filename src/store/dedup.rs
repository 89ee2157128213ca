//! Task identity, batch merging and summary assembly.
//!
//! Everything here is pure: callers load and persist.

use crate::types::{Section, SectionMap, Task};
use sha2::{Digest, Sha256};
use std::cmp::Reverse;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Task ids are rendered as a number below this bound.
pub const TASK_ID_MODULUS: u64 = 1_000_000;

/// Lower-case and strip all whitespace.
fn normalize(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Stable identity for a task, derived from subject, sender and requested action.
///
/// Two tasks whose fields differ only in case or whitespace get the same id.
/// Distinct tasks with the same normalized text collide and are treated as one.
pub fn generate_task_id(task: &Task) -> String {
    let key = format!(
        "{}:{}:{}",
        normalize(&task.subject),
        normalize(&task.sender),
        normalize(task.action_required.as_deref().unwrap_or_default()),
    );
    let digest = Sha256::digest(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    let n = u64::from_be_bytes(prefix) % TASK_ID_MODULUS;
    format!("{n:06}")
}

/// Merge an incoming batch into the existing outstanding tasks.
///
/// A task whose id is already present in its section gets its batch
/// timestamp refreshed, its batch count bumped and its entry ids unioned.
/// Anything else is appended. Incoming tasks must already carry a `task_id`.
pub fn merge_batch(mut existing: SectionMap, incoming: SectionMap, batch_timestamp: &str) -> SectionMap {
    for name in incoming.other_sections().keys() {
        warn!(section = %name, "Ignoring tasks in unknown section");
    }

    for (section, tasks) in incoming.into_sections() {
        let target = existing.get_mut(section);
        for mut task in tasks {
            task.normalize_entry_ids();
            let Some(task_id) = task.task_id.clone() else {
                warn!(section = %section, subject = %task.subject, "Skipping batch task without task_id");
                continue;
            };

            match target.iter_mut().find(|t| t.has_id(&task_id)) {
                Some(current) => {
                    current.batch_timestamp = Some(batch_timestamp.to_string());
                    current.batch_count += 1;
                    current.entry_ids.extend(task.entry_ids);
                    debug!(task_id = %task_id, batch_count = current.batch_count, "Merged recurring task");
                }
                None => target.push(task),
            }
        }
    }
    existing
}

/// Freshly processed tasks plus everything still outstanding, one list per section.
///
/// Outstanding tasks come first; batch tasks are appended unless their id is
/// already present. Actionable sections are then ordered by urgency.
pub fn comprehensive_summary(current_batch: &SectionMap, outstanding: &SectionMap) -> SectionMap {
    let mut summary = SectionMap::new();

    for section in Section::ALL {
        let mut merged = outstanding.get(section).to_vec();
        let mut seen: HashSet<String> = merged.iter().filter_map(|t| t.task_id.clone()).collect();

        for task in current_batch.get(section) {
            let task_id = task.task_id.clone().unwrap_or_else(|| generate_task_id(task));
            if !seen.insert(task_id.clone()) {
                continue;
            }
            let mut task = task.clone();
            task.task_id = Some(task_id);
            task.normalize_entry_ids();
            merged.push(task);
        }

        if section.is_actionable() {
            sort_by_urgency(&mut merged);
        }
        *summary.get_mut(section) = merged;
    }
    summary
}

/// Most-recurring first, then by priority rank, then by due date with undated last.
pub fn sort_by_urgency(tasks: &mut [Task]) {
    tasks.sort_by(|a, b| {
        let key = |t: &Task| {
            let due = t
                .due_date
                .as_deref()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or("zzz")
                .to_string();
            (Reverse(t.batch_count), t.priority_rank(), due)
        };
        key(a).cmp(&key(b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_id(mut task: Task) -> Task {
        task.task_id = Some(generate_task_id(&task));
        task
    }

    #[test]
    fn test_id_ignores_case_and_whitespace() {
        let a = Task::new("Review PR", "a@co.com").with_action("review");
        let b = Task::new("  review   pr ", "A@CO.COM ").with_action("Re view");
        assert_eq!(generate_task_id(&a), generate_task_id(&b));
    }

    #[test]
    fn test_id_is_bounded_decimal() {
        let id = generate_task_id(&Task::new("anything", "anyone"));
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_digit()));
        assert!(id.parse::<u64>().unwrap() < TASK_ID_MODULUS);
    }

    #[test]
    fn test_id_depends_on_action() {
        let a = Task::new("Review PR", "a@co.com").with_action("review");
        let b = Task::new("Review PR", "a@co.com").with_action("approve");
        let c = Task::new("Review PR", "a@co.com");
        assert_ne!(generate_task_id(&a), generate_task_id(&b));
        assert_ne!(generate_task_id(&a), generate_task_id(&c));
    }

    #[test]
    fn test_merge_appends_new_and_bumps_existing() {
        let task = with_id(Task::new("Review PR", "a@co.com").with_entry_id("E1"));
        let mut batch = SectionMap::new();
        batch.push(Section::RequiredActions, task.clone());

        let first = merge_batch(SectionMap::new(), batch, "2025-01-01 08:00:00");
        assert_eq!(first.get(Section::RequiredActions).len(), 1);
        assert_eq!(first.get(Section::RequiredActions)[0].batch_count, 1);

        let mut second_batch = SectionMap::new();
        second_batch.push(Section::RequiredActions, task.with_entry_id("E2"));
        let second = merge_batch(first, second_batch, "2025-01-02 08:00:00");

        let merged = &second.get(Section::RequiredActions)[0];
        assert_eq!(second.total(), 1);
        assert_eq!(merged.batch_count, 2);
        assert_eq!(merged.batch_timestamp.as_deref(), Some("2025-01-02 08:00:00"));
        assert_eq!(
            merged.entry_ids.iter().cloned().collect::<Vec<_>>(),
            vec!["E1".to_string(), "E2".to_string()]
        );
    }

    #[test]
    fn test_merge_leaves_other_sections_alone() {
        let mut existing = SectionMap::new();
        existing.push(Section::FyiNotices, with_id(Task::new("Office closed", "hr@co.com")));

        let mut batch = SectionMap::new();
        batch.push(Section::RequiredActions, with_id(Task::new("Sign form", "hr@co.com")));

        let merged = merge_batch(existing, batch, "2025-01-01 08:00:00");
        assert_eq!(merged.get(Section::FyiNotices).len(), 1);
        assert_eq!(merged.get(Section::RequiredActions).len(), 1);
    }

    #[test]
    fn test_merge_skips_tasks_without_id() {
        let mut batch = SectionMap::new();
        batch.push(Section::RequiredActions, Task::new("no id", "x"));
        let merged = merge_batch(SectionMap::new(), batch, "2025-01-01 08:00:00");
        assert!(merged.is_empty());
    }

    #[test]
    fn test_summary_carries_outstanding_forward() {
        let mut outstanding = SectionMap::new();
        outstanding.push(Section::RequiredActions, with_id(Task::new("Old", "a")));
        outstanding.push(Section::Newsletters, with_id(Task::new("Weekly", "news")));

        let mut batch = SectionMap::new();
        batch.push(Section::RequiredActions, Task::new("New", "b").with_entry_id("E9"));
        batch.push(Section::JobListings, Task::new("Rust dev", "jobs"));

        let summary = comprehensive_summary(&batch, &outstanding);
        assert_eq!(summary.total(), 4);

        let (_, added) = summary
            .tasks()
            .find(|(_, t)| t.subject == "New")
            .unwrap();
        assert!(added.task_id.is_some());
        assert!(added.entry_ids.contains("E9"));
        assert!(added.entry_id.is_none());
    }

    #[test]
    fn test_summary_does_not_duplicate_known_ids() {
        let task = with_id(Task::new("Review PR", "a@co.com"));
        let mut outstanding = SectionMap::new();
        outstanding.push(Section::TeamActions, task.clone());

        let mut batch = SectionMap::new();
        let mut fresh = task.clone();
        fresh.task_id = None;
        batch.push(Section::TeamActions, fresh);

        let summary = comprehensive_summary(&batch, &outstanding);
        assert_eq!(summary.get(Section::TeamActions).len(), 1);
    }

    #[test]
    fn test_summary_orders_actionable_sections() {
        let mut outstanding = SectionMap::new();

        let mut undated = with_id(Task::new("undated", "a"));
        undated.priority = Some(json!(1));
        let mut dated = with_id(Task::new("dated", "a"));
        dated.priority = Some(json!(1));
        dated.due_date = Some("2025-02-01".into());
        let mut recurring = with_id(Task::new("recurring", "a"));
        recurring.batch_count = 3;
        let mut low = with_id(Task::new("low", "a"));
        low.priority = Some(json!("low"));

        for task in [undated, low, dated, recurring] {
            outstanding.push(Section::RequiredActions, task);
        }

        let summary = comprehensive_summary(&SectionMap::new(), &outstanding);
        let order: Vec<&str> = summary
            .get(Section::RequiredActions)
            .iter()
            .map(|t| t.subject.as_str())
            .collect();
        assert_eq!(order, vec!["recurring", "dated", "undated", "low"]);
    }

    #[test]
    fn test_summary_keeps_insertion_order_for_passive_sections() {
        let mut outstanding = SectionMap::new();
        let mut first = with_id(Task::new("first", "a"));
        first.priority = Some(json!(50));
        let mut second = with_id(Task::new("second", "a"));
        second.batch_count = 9;
        outstanding.push(Section::FyiNotices, first);
        outstanding.push(Section::FyiNotices, second);

        let summary = comprehensive_summary(&SectionMap::new(), &outstanding);
        let order: Vec<&str> = summary
            .get(Section::FyiNotices)
            .iter()
            .map(|t| t.subject.as_str())
            .collect();
        assert_eq!(order, vec!["first", "second"]);
    }
}
