//! Core types for the triage task store.

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::warn;

/// Format of every timestamp the store writes.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rank given to tasks without a usable priority. Sorts after everything else.
pub const UNRANKED_PRIORITY: i64 = 99;

/// Current local wall-clock time.
pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Current local time rendered in [`TIMESTAMP_FORMAT`].
pub fn now_timestamp() -> String {
    format_timestamp(now_local())
}

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// `now` moved back by `days` whole days. Negative `days` count as zero.
///
/// Returns `None` when the result would fall before the earliest
/// representable time, meaning the window reaches back without bound.
pub fn days_before(now: NaiveDateTime, days: i64) -> Option<NaiveDateTime> {
    TimeDelta::try_days(days.max(0)).and_then(|span| now.checked_sub_signed(span))
}

/// Parse a stored timestamp.
///
/// Accepts the canonical `YYYY-MM-DD HH:MM:SS` form as well as ISO 8601
/// (`T` separator, optional fractional seconds, optional offset) so that
/// records written by other producers remain readable.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Local).naive_local())
        })
}

/// Parse a free-form priority string to a sort rank (lower = more urgent).
/// Returns [`UNRANKED_PRIORITY`] for unrecognized values.
pub fn parse_priority(s: &str) -> i64 {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "high" | "urgent" => 1,
        "medium" | "normal" => 2,
        "low" => 3,
        _ => s.parse().unwrap_or(UNRANKED_PRIORITY),
    }
}

/// One of the eight fixed task categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    RequiredActions,
    TeamActions,
    CompletedTeamActions,
    OptionalActions,
    JobListings,
    OptionalEvents,
    FyiNotices,
    Newsletters,
}

impl Section {
    /// Canonical sections in storage order.
    pub const ALL: [Section; 8] = [
        Section::RequiredActions,
        Section::TeamActions,
        Section::CompletedTeamActions,
        Section::OptionalActions,
        Section::JobListings,
        Section::OptionalEvents,
        Section::FyiNotices,
        Section::Newsletters,
    ];

    /// Sections whose tasks are ordered by urgency in summaries.
    pub const ACTIONABLE: [Section; 4] = [
        Section::RequiredActions,
        Section::TeamActions,
        Section::CompletedTeamActions,
        Section::OptionalActions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::RequiredActions => "required_actions",
            Section::TeamActions => "team_actions",
            Section::CompletedTeamActions => "completed_team_actions",
            Section::OptionalActions => "optional_actions",
            Section::JobListings => "job_listings",
            Section::OptionalEvents => "optional_events",
            Section::FyiNotices => "fyi_notices",
            Section::Newsletters => "newsletters",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        Section::ALL.into_iter().find(|section| section.as_str() == s)
    }

    pub fn is_actionable(&self) -> bool {
        Section::ACTIONABLE.contains(self)
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task status. Only ever moves from outstanding to completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Outstanding,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Outstanding => "outstanding",
            TaskStatus::Completed => "completed",
        }
    }
}

fn default_batch_count() -> u32 {
    1
}

/// Deserialize a string field that producers sometimes send as null or a number.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

/// A single action item, event, FYI notice or newsletter entry.
///
/// Fields the store does not interpret (explanation, links, ...) are kept in
/// `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, deserialize_with = "lenient_string")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_required: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    /// Free-form; see [`Task::priority_rank`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section: Option<Section>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_seen: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_timestamp: Option<String>,
    #[serde(default = "default_batch_count")]
    pub batch_count: u32,
    /// Source-email identifiers accumulated across batches.
    #[serde(rename = "_entry_ids", default)]
    pub entry_ids: BTreeSet<String>,
    /// Singular form sent by the extraction layer; folded into `entry_ids`.
    #[serde(rename = "_entry_id", default, skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_timestamp: Option<String>,

    /// Event date for optional events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Producer-supplied completion flag for team actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_status: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Task {
    fn default() -> Self {
        Self {
            subject: String::new(),
            sender: String::new(),
            action_required: None,
            due_date: None,
            priority: None,
            task_id: None,
            section: None,
            status: TaskStatus::Outstanding,
            first_seen: None,
            batch_timestamp: None,
            batch_count: default_batch_count(),
            entry_ids: BTreeSet::new(),
            entry_id: None,
            completion_timestamp: None,
            date: None,
            completion_status: None,
            extra: Map::new(),
        }
    }
}

impl Task {
    pub fn new(subject: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            sender: sender.into(),
            ..Self::default()
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action_required = Some(action.into());
        self
    }

    pub fn with_entry_id(mut self, entry_id: impl Into<String>) -> Self {
        self.entry_id = Some(entry_id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.task_id.as_deref()
    }

    pub fn has_id(&self, task_id: &str) -> bool {
        self.id() == Some(task_id)
    }

    /// Move a singular `_entry_id` into the `_entry_ids` set.
    pub fn normalize_entry_ids(&mut self) {
        if let Some(entry_id) = self.entry_id.take()
            && !entry_id.is_empty()
        {
            self.entry_ids.insert(entry_id);
        }
    }

    /// Sort rank for the priority field (lower = more urgent).
    pub fn priority_rank(&self) -> i64 {
        match &self.priority {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(UNRANKED_PRIORITY),
            Some(Value::String(s)) => parse_priority(s),
            _ => UNRANKED_PRIORITY,
        }
    }

    /// Whether the producer flagged this task as already resolved.
    pub fn is_externally_resolved(&self) -> bool {
        match &self.completion_status {
            Some(Value::Bool(done)) => *done,
            Some(Value::String(s)) => matches!(
                s.trim().to_lowercase().as_str(),
                "completed" | "complete" | "resolved" | "done"
            ),
            _ => false,
        }
    }
}

/// Tasks grouped by section.
///
/// All eight canonical sections are always present. Sections found in stored
/// documents that are not canonical are kept verbatim in `other`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionMap {
    sections: [Vec<Task>; 8],
    other: BTreeMap<String, Value>,
}

impl SectionMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, section: Section) -> &[Task] {
        &self.sections[section.index()]
    }

    pub fn get_mut(&mut self, section: Section) -> &mut Vec<Task> {
        &mut self.sections[section.index()]
    }

    pub fn push(&mut self, section: Section, task: Task) {
        self.get_mut(section).push(task);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Section, &Vec<Task>)> {
        Section::ALL.into_iter().zip(self.sections.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Section, &mut Vec<Task>)> {
        Section::ALL.into_iter().zip(self.sections.iter_mut())
    }

    pub fn into_sections(self) -> impl Iterator<Item = (Section, Vec<Task>)> {
        Section::ALL.into_iter().zip(self.sections)
    }

    /// Every task paired with its section, in section order.
    pub fn tasks(&self) -> impl Iterator<Item = (Section, &Task)> {
        self.iter()
            .flat_map(|(section, tasks)| tasks.iter().map(move |task| (section, task)))
    }

    pub fn find(&self, task_id: &str) -> Option<(Section, &Task)> {
        self.tasks().find(|(_, task)| task.has_id(task_id))
    }

    pub fn total(&self) -> usize {
        self.sections.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// A map holding only `section`. The other canonical sections come back
    /// empty and pass-through sections are dropped.
    pub fn only(mut self, section: Section) -> Self {
        let mut kept = Self::new();
        *kept.get_mut(section) = std::mem::take(self.get_mut(section));
        kept
    }

    /// Non-canonical sections carried through from storage.
    pub fn other_sections(&self) -> &BTreeMap<String, Value> {
        &self.other
    }

    /// Build a section map from loosely-typed JSON.
    ///
    /// Entries that cannot be read as a task are skipped with a warning; the
    /// rest of the section is kept.
    pub fn from_value(value: Value) -> Self {
        let mut map = Self::new();
        let Value::Object(object) = value else {
            if !value.is_null() {
                warn!("Section map is not a JSON object; ignoring it");
            }
            return map;
        };

        for (name, entries) in object {
            let Some(section) = Section::from_str(&name) else {
                map.other.insert(name, entries);
                continue;
            };
            let entries = match entries {
                Value::Array(entries) => entries,
                Value::Null => continue,
                _ => {
                    warn!(section = %section, "Section is not a list; ignoring it");
                    continue;
                }
            };
            for (index, entry) in entries.into_iter().enumerate() {
                match serde_json::from_value::<Task>(entry) {
                    Ok(task) => map.push(section, task),
                    Err(e) => {
                        warn!(section = %section, index, error = %e, "Skipping malformed task entry")
                    }
                }
            }
        }
        map
    }
}

impl Serialize for SectionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Section::ALL.len() + self.other.len()))?;
        for (section, tasks) in self.iter() {
            map.serialize_entry(section.as_str(), tasks)?;
        }
        for (name, value) in &self.other {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SectionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

/// Immutable audit entry written when a task is resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRecord {
    pub task_id: String,
    pub resolution_timestamp: String,
    pub resolution_type: String,
    #[serde(default)]
    pub resolution_notes: String,
    #[serde(default)]
    pub task_section: String,
    /// Snapshot of the task as it was when resolved.
    pub task_data: Task,
    #[serde(default)]
    pub task_age_days: i64,
    #[serde(default)]
    pub associated_emails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_priority: Option<Value>,
    #[serde(default)]
    pub task_sender: String,
}

/// An outstanding task that has been around for a while.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaleTask {
    pub task_id: String,
    pub subject: String,
    pub sender: String,
    pub section: Section,
    pub days_old: i64,
}

/// Aggregate counts over outstanding and completed storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatistics {
    pub total_outstanding: usize,
    pub total_completed: usize,
    /// At most five outstanding tasks first seen a week or more ago.
    pub old_tasks: Vec<StaleTask>,
    pub section_counts: BTreeMap<Section, usize>,
}

/// Age figures over a set of resolution records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeStats {
    pub average_days: f64,
    pub min_days: i64,
    pub max_days: i64,
}

/// Distributions over a set of resolution records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryStats {
    pub by_type: BTreeMap<String, usize>,
    pub by_section: BTreeMap<String, usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<AgeStats>,
}

/// Result of a resolution-history query, most recent record first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryResult {
    pub days_back: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution_type: Option<String>,
    pub total: usize,
    pub records: Vec<ResolutionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<HistoryStats>,
}
