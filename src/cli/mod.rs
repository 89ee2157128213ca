//! CLI command definitions for triage-tasks
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

pub mod export;
pub mod import;

use crate::format::OutputFormat;
use crate::types::Section;
use clap::{Args, Parser, Subcommand, ValueEnum};
use export::ExportArgs;
use import::ImportArgs;
use std::path::PathBuf;

/// Persistent task tracking for email triage
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage directory (overrides config)
    #[arg(short, long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// Output format for results: json or markdown
    #[arg(short, long, default_value = "json", value_parser = parse_format, global = true)]
    pub format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge a batch of triaged tasks (JSON section map) into outstanding storage
    Save(SaveArgs),

    /// Show outstanding tasks
    List(ListArgs),

    /// Combine a batch with everything still outstanding, sorted by urgency
    Summary {
        /// Batch file (JSON section map); `-` reads stdin
        batch: PathBuf,
    },

    /// Move tasks to completed storage
    Complete {
        #[arg(required = true)]
        task_ids: Vec<String>,

        /// Completion timestamp (default: now)
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// Record why a task was resolved, then complete it
    Resolve(ResolveArgs),

    /// Source email ids behind the given tasks
    EntryIds {
        #[arg(required = true)]
        task_ids: Vec<String>,
    },

    /// Counts per section and the oldest outstanding tasks
    Stats,

    /// Query the resolution history
    History(HistoryArgs),

    /// Drop completed tasks older than the retention window
    Cleanup {
        /// Days to keep (default: retention.completed_days)
        #[arg(long)]
        days: Option<i64>,
    },

    /// Empty low-priority sections
    Clear {
        #[arg(value_enum)]
        target: ClearTarget,
    },

    /// Export the whole store to a JSON snapshot
    Export(ExportArgs),

    /// Restore the store from an exported snapshot
    Import(ImportArgs),
}

#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Batch file (JSON section map); `-` reads stdin
    pub batch: PathBuf,

    /// Batch timestamp (default: now)
    #[arg(long)]
    pub timestamp: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Skip removal of expired events and resolved team actions
    #[arg(long)]
    pub keep_expired: bool,

    /// Only show one section
    #[arg(long, value_parser = parse_section)]
    pub section: Option<Section>,
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    pub task_id: String,

    /// Resolution type, e.g. completed, dismissed, deferred, delegated
    #[arg(long = "type", default_value = "completed")]
    pub resolution_type: String,

    #[arg(long)]
    pub notes: Option<String>,

    /// Resolution timestamp (default: now)
    #[arg(long)]
    pub timestamp: Option<String>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Days to look back (default: history.default_days_back)
    #[arg(long)]
    pub days: Option<i64>,

    /// Only records of this resolution type
    #[arg(long = "type")]
    pub resolution_type: Option<String>,

    /// Omit distribution statistics
    #[arg(long)]
    pub no_stats: bool,
}

/// Sections that can be cleared in bulk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClearTarget {
    Fyi,
    Newsletters,
    Events,
    FyiAndNewsletters,
}

fn parse_format(s: &str) -> Result<OutputFormat, String> {
    OutputFormat::from_str(s).ok_or_else(|| format!("unknown format '{}' (expected json or markdown)", s))
}

fn parse_section(s: &str) -> Result<Section, String> {
    Section::from_str(s).ok_or_else(|| {
        let names: Vec<&str> = Section::ALL.iter().map(Section::as_str).collect();
        format!("unknown section '{}' (expected one of: {})", s, names.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_resolve() {
        let cli = Cli::parse_from([
            "triage-tasks",
            "resolve",
            "123456",
            "--type",
            "dismissed",
            "--notes",
            "not relevant",
        ]);
        match cli.command {
            Command::Resolve(args) => {
                assert_eq!(args.task_id, "123456");
                assert_eq!(args.resolution_type, "dismissed");
                assert_eq!(args.notes.as_deref(), Some("not relevant"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["triage-tasks", "stats", "--format", "markdown", "-s", "/tmp/t"]);
        assert_eq!(cli.format, OutputFormat::Markdown);
        assert_eq!(cli.storage_dir, Some(PathBuf::from("/tmp/t")));
        assert_eq!(cli.log, "2");
    }

    #[test]
    fn test_clear_target_names() {
        let cli = Cli::parse_from(["triage-tasks", "clear", "fyi-and-newsletters"]);
        assert!(matches!(
            cli.command,
            Command::Clear {
                target: ClearTarget::FyiAndNewsletters
            }
        ));
    }

    #[test]
    fn test_list_section_filter() {
        let cli = Cli::parse_from(["triage-tasks", "list", "--section", "team_actions"]);
        match cli.command {
            Command::List(args) => assert_eq!(args.section, Some(Section::TeamActions)),
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(Cli::try_parse_from(["triage-tasks", "list", "--section", "bogus"]).is_err());
    }
}
