//! triage-tasks CLI
//!
//! Command-line access to the task tracker: merge triaged batches, list and
//! complete tasks, and query the resolution history.

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};
use triage_tasks::cli::export::ExportArgs;
use triage_tasks::cli::import::ImportArgs;
use triage_tasks::cli::{ClearTarget, Cli, Command, HistoryArgs, ListArgs, ResolveArgs, SaveArgs};
use triage_tasks::config::Config;
use triage_tasks::export::Snapshot;
use triage_tasks::format::{
    OutputFormat, format_history_markdown, format_sections_markdown, format_statistics_markdown,
};
use triage_tasks::logging::{LogTarget, init_logging};
use triage_tasks::tracker::TaskTracker;
use triage_tasks::types::SectionMap;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(dir) = &cli.storage_dir {
        config.storage.dir = dir.clone();
    }
    config.ensure_storage_dir()?;
    debug!(storage_dir = %config.storage.dir.display(), "Using storage directory");

    let tracker = TaskTracker::open(&config.storage.dir);
    let format = cli.format;

    match cli.command {
        Command::Save(args) => run_save(&tracker, args, format),
        Command::List(args) => run_list(&tracker, args, format),
        Command::Summary { batch } => {
            let batch = read_batch(&batch)?;
            let summary = tracker.get_comprehensive_summary(&batch);
            emit_sections(&summary, format)
        }
        Command::Complete { task_ids, timestamp } => {
            let moved = tracker.mark_tasks_completed(&task_ids, timestamp.as_deref());
            emit_count("completed", moved, format)
        }
        Command::Resolve(args) => run_resolve(&tracker, args, format),
        Command::EntryIds { task_ids } => {
            let entry_ids = tracker.get_entry_ids_for_tasks(&task_ids);
            match format {
                OutputFormat::Json => print_json(&entry_ids),
                OutputFormat::Markdown => {
                    for id in &entry_ids {
                        println!("- `{}`", id);
                    }
                    Ok(())
                }
            }
        }
        Command::Stats => {
            let stats = tracker.get_task_statistics();
            match format {
                OutputFormat::Json => print_json(&stats),
                OutputFormat::Markdown => print_markdown(format_statistics_markdown(&stats)),
            }
        }
        Command::History(args) => run_history(&tracker, &config, args, format),
        Command::Cleanup { days } => {
            let days = days.unwrap_or(config.retention.completed_days);
            let removed = tracker.cleanup_old_completed_tasks(days);
            emit_count("removed", removed, format)
        }
        Command::Clear { target } => run_clear(&tracker, target, format),
        Command::Export(args) => run_export(&tracker, args),
        Command::Import(args) => run_import(&tracker, args, format),
    }
}

/// Read a batch from `path`, or from stdin when `path` is `-`.
fn read_batch(path: &Path) -> Result<SectionMap> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    let batch: SectionMap =
        serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
    Ok(batch)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_markdown(md: String) -> Result<()> {
    print!("{}", md);
    Ok(())
}

fn emit_sections(tasks: &SectionMap, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(tasks),
        OutputFormat::Markdown => print_markdown(format_sections_markdown(tasks)),
    }
}

fn emit_count(label: &str, count: usize, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({ label: count })),
        OutputFormat::Markdown => print_markdown(format!("{}: {}\n", label, count)),
    }
}

fn run_save(tracker: &TaskTracker, args: SaveArgs, format: OutputFormat) -> Result<()> {
    let batch = read_batch(&args.batch)?;
    let incoming = batch.total();
    if !tracker.save_outstanding_tasks(batch, args.timestamp.as_deref()) {
        bail!("could not write outstanding tasks to {}", tracker.store().dir().display());
    }
    info!(incoming, "Batch saved");
    emit_count("saved", incoming, format)
}

fn run_list(tracker: &TaskTracker, args: ListArgs, format: OutputFormat) -> Result<()> {
    let tasks = tracker.load_outstanding_tasks(!args.keep_expired);
    let tasks = match args.section {
        Some(section) => tasks.only(section),
        None => tasks,
    };
    emit_sections(&tasks, format)
}

fn run_resolve(tracker: &TaskTracker, args: ResolveArgs, format: OutputFormat) -> Result<()> {
    let recorded = tracker.record_task_resolution(
        &args.task_id,
        &args.resolution_type,
        args.notes.as_deref(),
        args.timestamp.as_deref(),
    );
    if !recorded {
        bail!("could not record resolution for task {}", args.task_id);
    }
    match format {
        OutputFormat::Json => print_json(&json!({
            "task_id": args.task_id,
            "resolution_type": args.resolution_type,
            "recorded": true,
        })),
        OutputFormat::Markdown => print_markdown(format!(
            "Resolved `{}` as {}\n",
            args.task_id, args.resolution_type
        )),
    }
}

fn run_history(
    tracker: &TaskTracker,
    config: &Config,
    args: HistoryArgs,
    format: OutputFormat,
) -> Result<()> {
    let days = args.days.unwrap_or(config.history.default_days_back);
    let history =
        tracker.get_resolution_history(days, args.resolution_type.as_deref(), !args.no_stats);
    match format {
        OutputFormat::Json => print_json(&history),
        OutputFormat::Markdown => print_markdown(format_history_markdown(&history)),
    }
}

fn run_clear(tracker: &TaskTracker, target: ClearTarget, format: OutputFormat) -> Result<()> {
    let result = match target {
        ClearTarget::Fyi => json!({ "fyi_notices": tracker.clear_fyi_items() }),
        ClearTarget::Newsletters => json!({ "newsletters": tracker.clear_newsletter_items() }),
        ClearTarget::Events => json!({ "optional_events": tracker.clear_optional_events() }),
        ClearTarget::FyiAndNewsletters => {
            let (fyi, newsletters) = tracker.clear_both_fyi_and_newsletters();
            json!({ "fyi_notices": fyi, "newsletters": newsletters })
        }
    };
    match format {
        OutputFormat::Json => print_json(&result),
        OutputFormat::Markdown => {
            let mut md = String::from("Cleared:\n");
            if let Some(counts) = result.as_object() {
                for (section, count) in counts {
                    md.push_str(&format!("- {}: {}\n", section, count));
                }
            }
            print_markdown(md)
        }
    }
}

/// Run the export command
fn run_export(tracker: &TaskTracker, args: ExportArgs) -> Result<()> {
    let mut snapshot = tracker.export_snapshot();
    if args.no_history {
        snapshot.resolutions.clear();
    }
    let (outstanding, completed, resolutions) = snapshot.counts();

    if let Some(ref path) = args.output {
        let compress = args.should_compress();
        snapshot.write_to(path, compress)?;
        info!(outstanding, completed, resolutions, gzip = compress, "Snapshot exported");
        eprintln!(
            "Exported to {}{}",
            path.display(),
            if compress { " (gzipped)" } else { "" }
        );
    } else if args.should_compress() {
        use flate2::Compression;
        use flate2::write::GzEncoder;

        let stdout = std::io::stdout();
        let mut encoder = GzEncoder::new(stdout.lock(), Compression::default());
        encoder.write_all(snapshot.to_json_pretty()?.as_bytes())?;
        encoder.finish()?;
    } else {
        println!("{}", snapshot.to_json_pretty()?);
    }

    Ok(())
}

/// Run the import command
fn run_import(tracker: &TaskTracker, args: ImportArgs, format: OutputFormat) -> Result<()> {
    let snapshot = Snapshot::from_file(&args.file)?;
    let (outstanding, completed, resolutions) = snapshot.counts();
    debug!(
        file = %args.file.display(),
        version = %snapshot.export_version,
        exported_by = %snapshot.exported_by,
        "Read snapshot"
    );

    let added = if args.dry_run {
        0
    } else {
        tracker
            .import_snapshot(&snapshot)
            .with_context(|| format!("importing {}", args.file.display()))?
    };

    let report = json!({
        "outstanding": outstanding,
        "completed": completed,
        "resolutions": resolutions,
        "resolutions_added": added,
        "dry_run": args.dry_run,
    });
    match format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Markdown => print_markdown(format!(
            "{} {}: {} outstanding, {} completed, {} resolutions ({} new)\n",
            if args.dry_run { "Would import" } else { "Imported" },
            args.file.display(),
            outstanding,
            completed,
            resolutions,
            added
        )),
    }
}
