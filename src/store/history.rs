//! Append-only resolution history, one JSONL file per calendar month.

use crate::error::{StorageError, StorageResult};
use crate::types::{ResolutionRecord, parse_timestamp};
use chrono::NaiveDateTime;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const HISTORY_FILE_PREFIX: &str = "task_resolutions_";
pub const HISTORY_FILE_EXT: &str = "jsonl";

/// File name for the month containing `at`, e.g. `task_resolutions_2025_03.jsonl`.
pub fn history_file_name(at: NaiveDateTime) -> String {
    format!("{HISTORY_FILE_PREFIX}{}.{HISTORY_FILE_EXT}", at.format("%Y_%m"))
}

fn is_history_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == HISTORY_FILE_EXT)
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(HISTORY_FILE_PREFIX))
}

/// Append one record to the month file for its resolution timestamp.
///
/// Creates the history directory and the file as needed. Returns the file written.
pub fn append_resolution(dir: &Path, record: &ResolutionRecord, now: NaiveDateTime) -> StorageResult<PathBuf> {
    std::fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;

    let month = parse_timestamp(&record.resolution_timestamp).unwrap_or(now);
    let path = dir.join(history_file_name(month));
    serde_jsonlines::append_json_lines(&path, [record]).map_err(|e| StorageError::io(&path, e))?;

    debug!(task_id = %record.task_id, file = %path.display(), "Appended resolution record");
    Ok(path)
}

/// Every readable record across all month files, in file order.
///
/// Lines that do not parse are skipped with a warning.
pub fn read_resolutions(dir: &Path) -> StorageResult<Vec<ResolutionRecord>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StorageError::io(dir, e)),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_history_file(path))
        .collect();
    files.sort();

    let mut records = Vec::new();
    for path in files {
        let file = match std::fs::File::open(&path) {
            Ok(file) => file,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Could not open history file");
                continue;
            }
        };
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Stopped reading history file");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ResolutionRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    file = %path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping unreadable resolution record"
                ),
            }
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Task;
    use std::io::Write;
    use tempfile::TempDir;

    fn record(task_id: &str, at: &str) -> ResolutionRecord {
        ResolutionRecord {
            task_id: task_id.to_string(),
            resolution_timestamp: at.to_string(),
            resolution_type: "completed".to_string(),
            resolution_notes: String::new(),
            task_section: "required_actions".to_string(),
            task_data: Task::new("s", "a@co.com"),
            task_age_days: 1,
            associated_emails: vec![],
            task_priority: None,
            task_sender: "a@co.com".to_string(),
        }
    }

    fn at(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn test_file_name_is_partitioned_by_month() {
        assert_eq!(
            history_file_name(at("2025-03-09 10:00:00")),
            "task_resolutions_2025_03.jsonl"
        );
    }

    #[test]
    fn test_append_creates_directory_and_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let history = dir.path().join("task_history");

        let path = append_resolution(&history, &record("1", "2025-03-01 10:00:00"), at("2025-03-01 10:00:00")).unwrap();
        append_resolution(&history, &record("2", "2025-03-02 10:00:00"), at("2025-03-02 10:00:00")).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_records_land_in_their_own_month() {
        let dir = TempDir::new().unwrap();
        let now = at("2025-04-01 00:00:00");
        append_resolution(dir.path(), &record("1", "2025-03-31 23:59:59"), now).unwrap();
        append_resolution(dir.path(), &record("2", "2025-04-01 00:00:00"), now).unwrap();

        assert!(dir.path().join("task_resolutions_2025_03.jsonl").exists());
        assert!(dir.path().join("task_resolutions_2025_04.jsonl").exists());
        assert_eq!(read_resolutions(dir.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_read_skips_garbage_lines_and_foreign_files() {
        let dir = TempDir::new().unwrap();
        let path = append_resolution(dir.path(), &record("1", "2025-03-01 10:00:00"), at("2025-03-01 10:00:00")).unwrap();

        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{ this is not json").unwrap();
        writeln!(file).unwrap();
        drop(file);
        append_resolution(dir.path(), &record("2", "2025-03-02 10:00:00"), at("2025-03-02 10:00:00")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        let records = read_resolutions(dir.path()).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.task_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_missing_directory_reads_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_resolutions(&dir.path().join("nope")).unwrap().is_empty());
    }
}
