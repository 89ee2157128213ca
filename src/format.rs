//! Output formatting utilities for markdown and JSON.

use crate::types::{HistoryResult, Section, SectionMap, Task, TaskStatistics};

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

impl OutputFormat {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

/// Format a section name for display (capitalize, replace underscores with spaces).
fn format_section_name(section: &str) -> String {
    section
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a task in short form for lists.
fn format_task_short(task: &Task) -> String {
    let urgent = if task.priority_rank() == 1 { "!!! " } else { "" };

    let id = task
        .task_id
        .as_ref()
        .map(|id| format!(" `{}`", id))
        .unwrap_or_default();

    let sender = if task.sender.is_empty() {
        String::new()
    } else {
        format!(" from {}", task.sender)
    };

    let seen = if task.batch_count > 1 {
        format!(" (seen {}x)", task.batch_count)
    } else {
        String::new()
    };

    let due = task
        .due_date
        .as_ref()
        .map(|d| format!(" - due {}", d))
        .unwrap_or_default();

    format!("- {}{}{}{}{}{}\n", urgent, task.subject, sender, id, seen, due)
}

/// Format a section map as markdown, one heading per non-empty section.
pub fn format_sections_markdown(tasks: &SectionMap) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Tasks ({})\n\n", tasks.total()));

    for (section, section_tasks) in tasks.iter() {
        if section_tasks.is_empty() {
            continue;
        }
        md.push_str(&format!(
            "## {} ({})\n\n",
            format_section_name(section.as_str()),
            section_tasks.len()
        ));
        for task in section_tasks {
            md.push_str(&format_task_short(task));
        }
        md.push('\n');
    }

    md
}

/// Format task statistics as markdown.
pub fn format_statistics_markdown(stats: &TaskStatistics) -> String {
    let mut md = String::new();

    md.push_str("# Task Statistics\n\n");
    md.push_str(&format!("- **outstanding**: {}\n", stats.total_outstanding));
    md.push_str(&format!("- **completed**: {}\n", stats.total_completed));

    md.push_str("\n## By Section\n\n");
    for section in Section::ALL {
        let count = stats.section_counts.get(&section).copied().unwrap_or(0);
        md.push_str(&format!("- {}: {}\n", format_section_name(section.as_str()), count));
    }

    if !stats.old_tasks.is_empty() {
        md.push_str("\n## Oldest Outstanding\n\n");
        for stale in &stats.old_tasks {
            md.push_str(&format!(
                "- {} `{}` ({} days, {})\n",
                stale.subject, stale.task_id, stale.days_old, stale.section
            ));
        }
    }

    md
}

/// Format a resolution-history query as markdown.
pub fn format_history_markdown(history: &HistoryResult) -> String {
    let mut md = String::new();

    let filter = history
        .resolution_type
        .as_ref()
        .map(|t| format!(", type {}", t))
        .unwrap_or_default();
    md.push_str(&format!(
        "# Resolutions ({}, last {} days{})\n\n",
        history.total, history.days_back, filter
    ));

    for record in &history.records {
        md.push_str(&format!(
            "- {} **{}** {} `{}`",
            record.resolution_timestamp,
            record.resolution_type,
            record.task_data.subject,
            record.task_id
        ));
        if !record.resolution_notes.is_empty() {
            md.push_str(&format!(" - _{}_", record.resolution_notes));
        }
        md.push('\n');
    }

    if let Some(ref stats) = history.stats {
        md.push_str("\n## By Type\n\n");
        for (kind, count) in &stats.by_type {
            md.push_str(&format!("- {}: {}\n", kind, count));
        }
        md.push_str("\n## By Section\n\n");
        for (section, count) in &stats.by_section {
            md.push_str(&format!("- {}: {}\n", format_section_name(section), count));
        }
        if let Some(ref age) = stats.age {
            md.push_str(&format!(
                "\nAge: avg {:.1} days, min {}, max {}\n",
                age.average_days, age.min_days, age.max_days
            ));
        }
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StaleTask;
    use std::collections::BTreeMap;

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("md"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::from_str("yaml"), None);
    }

    #[test]
    fn test_section_name() {
        assert_eq!(format_section_name("completed_team_actions"), "Completed Team Actions");
        assert_eq!(format_section_name("fyi_notices"), "Fyi Notices");
    }

    #[test]
    fn test_sections_markdown_skips_empty_sections() {
        let mut tasks = SectionMap::new();
        let mut task = Task::new("Review PR", "alice@co.com");
        task.task_id = Some("123456".into());
        task.batch_count = 3;
        task.due_date = Some("2025-06-20".into());
        task.priority = Some("high".into());
        tasks.push(Section::RequiredActions, task);

        let md = format_sections_markdown(&tasks);
        assert!(md.starts_with("# Tasks (1)"));
        assert!(md.contains("## Required Actions (1)"));
        assert!(md.contains("- !!! Review PR from alice@co.com `123456` (seen 3x) - due 2025-06-20"));
        assert!(!md.contains("Newsletters"));
    }

    #[test]
    fn test_statistics_markdown_lists_every_section() {
        let stats = TaskStatistics {
            total_outstanding: 2,
            total_completed: 1,
            old_tasks: vec![StaleTask {
                task_id: "000001".into(),
                subject: "Old thing".into(),
                sender: "a".into(),
                section: Section::TeamActions,
                days_old: 12,
            }],
            section_counts: BTreeMap::from([(Section::TeamActions, 2)]),
        };

        let md = format_statistics_markdown(&stats);
        assert!(md.contains("- **outstanding**: 2"));
        assert!(md.contains("- Team Actions: 2"));
        assert!(md.contains("- Newsletters: 0"));
        assert!(md.contains("Old thing `000001` (12 days, team_actions)"));
    }
}
