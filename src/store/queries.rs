//! Read-side aggregation and bulk clears of low-priority sections.

use super::TaskStore;
use super::history::read_resolutions;
use crate::types::{
    AgeStats, HistoryResult, HistoryStats, ResolutionRecord, Section, StaleTask, TaskStatistics,
    days_before, format_timestamp, now_local, parse_timestamp,
};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{info, warn};

/// Outstanding tasks at least this many days old are reported as stale.
pub const STALE_AFTER_DAYS: i64 = 7;

/// Maximum number of stale tasks listed in statistics.
pub const STALE_TASK_LIMIT: usize = 5;

/// Distributions and age figures over `records`.
pub fn summarize_history(records: &[ResolutionRecord]) -> HistoryStats {
    let mut stats = HistoryStats::default();
    for record in records {
        *stats.by_type.entry(record.resolution_type.clone()).or_default() += 1;
        *stats.by_section.entry(record.task_section.clone()).or_default() += 1;
    }

    let ages: Vec<i64> = records.iter().map(|r| r.task_age_days).collect();
    if let (Some(&min_days), Some(&max_days)) = (ages.iter().min(), ages.iter().max()) {
        stats.age = Some(AgeStats {
            average_days: ages.iter().sum::<i64>() as f64 / ages.len() as f64,
            min_days,
            max_days,
        });
    }
    stats
}

impl TaskStore {
    /// Source-email ids behind the given tasks, deduplicated.
    pub fn entry_ids_for_tasks(&self, task_ids: &[String]) -> Vec<String> {
        let wanted: HashSet<&str> = task_ids.iter().map(String::as_str).collect();
        let outstanding = self.load_outstanding();

        let entry_ids: BTreeSet<&String> = outstanding
            .tasks()
            .filter(|(_, task)| task.id().is_some_and(|id| wanted.contains(id)))
            .flat_map(|(_, task)| task.entry_ids.iter())
            .collect();
        entry_ids.into_iter().cloned().collect()
    }

    pub fn task_statistics(&self) -> TaskStatistics {
        self.task_statistics_at(now_local())
    }

    /// Statistics as of `now`.
    pub fn task_statistics_at(&self, now: NaiveDateTime) -> TaskStatistics {
        let outstanding = self.load_outstanding();
        let completed = self.load_completed();

        let section_counts: BTreeMap<Section, usize> = outstanding
            .iter()
            .map(|(section, tasks)| (section, tasks.len()))
            .collect();

        let old_tasks = outstanding
            .tasks()
            .filter_map(|(section, task)| {
                let first_seen = task.first_seen.as_deref().and_then(parse_timestamp)?;
                let days_old = (now - first_seen).num_days();
                (days_old >= STALE_AFTER_DAYS).then(|| StaleTask {
                    task_id: task.task_id.clone().unwrap_or_default(),
                    subject: task.subject.clone(),
                    sender: task.sender.clone(),
                    section,
                    days_old,
                })
            })
            .take(STALE_TASK_LIMIT)
            .collect();

        TaskStatistics {
            total_outstanding: outstanding.total(),
            total_completed: completed.len(),
            old_tasks,
            section_counts,
        }
    }

    pub fn resolution_history(
        &self,
        days_back: i64,
        resolution_type: Option<&str>,
        include_stats: bool,
    ) -> HistoryResult {
        self.resolution_history_at(now_local(), days_back, resolution_type, include_stats)
    }

    /// Resolution records from the `days_back` days up to `now`, newest first.
    ///
    /// Negative `days_back` counts as zero. A window reaching past the earliest
    /// representable date includes every record.
    pub fn resolution_history_at(
        &self,
        now: NaiveDateTime,
        days_back: i64,
        resolution_type: Option<&str>,
        include_stats: bool,
    ) -> HistoryResult {
        let records = read_resolutions(&self.history_dir()).unwrap_or_else(|e| {
            warn!(error = %e, "Could not read resolution history");
            Vec::new()
        });
        let days_back = days_back.max(0);
        let cutoff = days_before(now, days_back);

        let mut matching: Vec<(NaiveDateTime, ResolutionRecord)> = records
            .into_iter()
            .filter(|record| resolution_type.is_none_or(|wanted| record.resolution_type == wanted))
            .filter_map(|record| {
                let Some(resolved_at) = parse_timestamp(&record.resolution_timestamp) else {
                    warn!(
                        task_id = %record.task_id,
                        timestamp = %record.resolution_timestamp,
                        "Skipping resolution record with unreadable timestamp"
                    );
                    return None;
                };
                (cutoff.is_none_or(|c| resolved_at >= c) && resolved_at <= now).then_some((resolved_at, record))
            })
            .collect();
        matching.sort_by(|a, b| b.0.cmp(&a.0));

        let records: Vec<ResolutionRecord> = matching.into_iter().map(|(_, record)| record).collect();
        let stats = include_stats.then(|| summarize_history(&records));

        HistoryResult {
            days_back,
            resolution_type: resolution_type.map(str::to_string),
            total: records.len(),
            records,
            stats,
        }
    }

    /// Empty each of `sections`, persisting once if anything was removed.
    /// Returns the number removed per section, in the same order.
    fn clear_sections(&self, sections: &[Section]) -> Vec<usize> {
        let mut outstanding = self.load_outstanding();
        let removed: Vec<usize> = sections
            .iter()
            .map(|&section| {
                let cleared = std::mem::take(outstanding.get_mut(section)).len();
                if cleared > 0 {
                    info!(section = %section, cleared, "Cleared section");
                }
                cleared
            })
            .collect();

        if removed.iter().any(|&n| n > 0) {
            self.save_outstanding(&outstanding, &format_timestamp(now_local()));
        }
        removed
    }

    pub fn clear_fyi_items(&self) -> usize {
        self.clear_sections(&[Section::FyiNotices])[0]
    }

    pub fn clear_newsletter_items(&self) -> usize {
        self.clear_sections(&[Section::Newsletters])[0]
    }

    pub fn clear_optional_events(&self) -> usize {
        self.clear_sections(&[Section::OptionalEvents])[0]
    }

    /// Clear FYI notices and newsletters in a single write.
    pub fn clear_both_fyi_and_newsletters(&self) -> (usize, usize) {
        let removed = self.clear_sections(&[Section::FyiNotices, Section::Newsletters]);
        (removed[0], removed[1])
    }
}
